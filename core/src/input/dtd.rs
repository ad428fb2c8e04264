//! Compatibility shim for documents with a broken internal DTD subset.
//!
//! Some health data exports carry an internal DTD subset that strict parsers
//! reject (for example `ATTLIST` declarations without attribute names). The
//! shim looks for the end of the internal subset (`]>`) within the first
//! [`LOOKAHEAD_WINDOW`] bytes. If it is found, the parser starts right after
//! it and never sees the prolog. Otherwise the source is rewound and parsed
//! unmodified.
//!
//! This is a heuristic, not a DTD parser. A `]>` inside a comment or CDATA
//! section near the start of a document without DTD triggers it as well.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};

/// Number of bytes scanned for the end of the internal DTD subset
pub const LOOKAHEAD_WINDOW: usize = 10_000;

const INTERNAL_SUBSET_END: &[u8] = b"]>";

/// A source that is positioned where the XML parser should start reading
pub struct Sanitized<R> {
    reader: BufReader<R>,
    offset: u64,
}

impl<R> Sanitized<R> {
    /// Byte offset in the original source at which parsing starts
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// `true` if the document prolog has been skipped
    pub fn skipped_prolog(&self) -> bool {
        self.offset > 0
    }
}

impl<R: Read> Read for Sanitized<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read> BufRead for Sanitized<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

/// Scan the start of `source` for the end of an internal DTD subset and
/// position the returned reader accordingly. The scanned bytes are consumed
/// and discarded if the marker is found.
pub fn skip_internal_subset<R: Read + Seek>(source: R) -> io::Result<Sanitized<R>> {
    let mut reader = BufReader::new(source);
    let mut lookahead = Vec::with_capacity(LOOKAHEAD_WINDOW);

    while lookahead.len() < LOOKAHEAD_WINDOW {
        let Some(b) = read_byte(&mut reader)? else {
            break;
        };
        lookahead.push(b);

        // only accept the marker if everything up to here is valid text
        if lookahead.ends_with(INTERNAL_SUBSET_END) && std::str::from_utf8(&lookahead).is_ok() {
            return Ok(Sanitized {
                reader,
                offset: lookahead.len() as u64,
            });
        }
    }

    reader.seek(SeekFrom::Start(0))?;
    Ok(Sanitized { reader, offset: 0 })
}

fn read_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    loop {
        match reader.read(&mut b) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(b[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
