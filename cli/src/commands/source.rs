use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempdir::TempDir;
use tracing::debug;
use zip::ZipArchive;

use super::split_error::SplitCommandError;

/// Location of the XML document inside a health data export archive
pub const EXPORT_ENTRY: &str = "apple_health_export/export.xml";

/// An XML document ready to be split. Documents extracted from an archive
/// live in a scratch directory that is removed when this value is dropped.
#[derive(Debug)]
pub struct PreparedSource {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl PreparedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_extracted(&self) -> bool {
        self.scratch.is_some()
    }
}

/// `true` if `path` looks like an export archive rather than an XML document
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Return the XML document to split. Archives are extracted into a scratch
/// directory first, all other files are used as they are.
pub fn prepare_source(path: &Path) -> Result<PreparedSource, SplitCommandError> {
    if !is_archive(path) {
        return Ok(PreparedSource {
            path: path.to_path_buf(),
            scratch: None,
        });
    }

    let file = File::open(path).map_err(|source| SplitCommandError::OpenSource {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|source| SplitCommandError::InvalidArchive {
            path: path.to_path_buf(),
            source,
        })?;
    let mut entry =
        archive
            .by_name(EXPORT_ENTRY)
            .map_err(|source| SplitCommandError::MissingExportEntry {
                path: path.to_path_buf(),
                source,
            })?;

    let extract_error = |source| SplitCommandError::Extract {
        path: path.to_path_buf(),
        source,
    };
    let scratch = TempDir::new("healthsplit").map_err(extract_error)?;
    let target = scratch.path().join("export.xml");
    let mut out = BufWriter::new(File::create(&target).map_err(extract_error)?);
    io::copy(&mut entry, &mut out).map_err(extract_error)?;
    out.flush().map_err(extract_error)?;
    debug!("Extracted {EXPORT_ENTRY} from {path:?} to {target:?}");

    Ok(PreparedSource {
        path: target,
        scratch: Some(scratch),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        fs::{self, File},
        io::Write,
        path::Path,
    };

    use assertor::{assert_that, BooleanAssertion, EqualityAssertion};
    use tempdir::TempDir;
    use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

    use crate::commands::split_error::SplitCommandError;

    use super::{is_archive, prepare_source, EXPORT_ENTRY};

    /// Write an archive with the given entries
    pub(crate) fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn archive_extension() {
        assert_that!(is_archive(Path::new("export.zip"))).is_true();
        assert_that!(is_archive(Path::new("EXPORT.ZIP"))).is_true();
        assert_that!(is_archive(Path::new("export.xml"))).is_false();
        assert_that!(is_archive(Path::new("zip"))).is_false();
    }

    #[test]
    fn xml_is_used_directly() {
        let source = prepare_source(Path::new("export.xml")).unwrap();
        assert_that!(source.path().to_path_buf()).is_equal_to(Path::new("export.xml").to_path_buf());
        assert_that!(source.is_extracted()).is_false();
    }

    #[test]
    fn extract_export() {
        let dir = TempDir::new("healthsplit_source").unwrap();
        let archive = dir.path().join("export.zip");
        write_archive(
            &archive,
            &[
                ("apple_health_export/export_cda.xml", "<ClinicalDocument/>"),
                (EXPORT_ENTRY, "<HealthData><Record/></HealthData>"),
            ],
        );

        let source = prepare_source(&archive).unwrap();
        assert_that!(source.is_extracted()).is_true();
        assert_that!(fs::read_to_string(source.path()).unwrap())
            .is_equal_to("<HealthData><Record/></HealthData>".to_string());

        // the scratch directory goes away with the source
        let extracted = source.path().to_path_buf();
        drop(source);
        assert_that!(extracted.exists()).is_false();
    }

    #[test]
    fn missing_entry() {
        let dir = TempDir::new("healthsplit_source").unwrap();
        let archive = dir.path().join("export.zip");
        write_archive(&archive, &[("other.xml", "<a/>")]);
        assert!(matches!(
            prepare_source(&archive),
            Err(SplitCommandError::MissingExportEntry { .. })
        ));
    }

    #[test]
    fn not_an_archive() {
        let dir = TempDir::new("healthsplit_source").unwrap();
        let archive = dir.path().join("export.zip");
        fs::write(&archive, "<HealthData/>").unwrap();
        assert!(matches!(
            prepare_source(&archive),
            Err(SplitCommandError::InvalidArchive { .. })
        ));
    }
}
