use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

/// An owned element event decoded from a [`quick_xml`] event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },

    /// A self-closing element (`<a/>`). Equivalent to a start event
    /// immediately followed by an end event.
    Empty {
        name: String,
        attributes: Vec<(String, String)>,
    },

    End {
        name: String,
    },
}

impl ElementEvent {
    /// Decode a parser event. Returns [`None`] for events that neither open
    /// nor close an element (text, comments, processing instructions, ...).
    pub fn from_xml<B>(event: &Event, reader: &Reader<B>) -> Result<Option<Self>, quick_xml::Error> {
        convert(event, reader, false)
    }

    /// Like [`from_xml`](Self::from_xml) but recovers from most errors.
    /// Names and values that are not valid UTF-8 are decoded lossily, values
    /// with unknown entities are kept as they are, duplicate attributes are
    /// dropped, and so are all attributes after the first malformed one.
    /// Elements without a name cannot be written back and yield [`None`].
    pub fn from_xml_lossy<B>(event: &Event, reader: &Reader<B>) -> Option<Self> {
        convert(event, reader, true).ok().flatten()
    }

    pub fn name(&self) -> &str {
        match self {
            ElementEvent::Start { name, .. }
            | ElementEvent::Empty { name, .. }
            | ElementEvent::End { name } => name,
        }
    }
}

fn convert<B>(
    event: &Event,
    reader: &Reader<B>,
    lossy: bool,
) -> Result<Option<ElementEvent>, quick_xml::Error> {
    let r = match event {
        Event::Start(s) => Some(ElementEvent::Start {
            name: element_name(s.name().as_ref(), reader, lossy)?,
            attributes: decode_attributes(s, reader, lossy)?,
        }),

        Event::Empty(s) => Some(ElementEvent::Empty {
            name: element_name(s.name().as_ref(), reader, lossy)?,
            attributes: decode_attributes(s, reader, lossy)?,
        }),

        Event::End(e) => Some(ElementEvent::End {
            name: element_name(e.name().as_ref(), reader, lossy)?,
        }),

        _ => None,
    };
    Ok(r)
}

/// quick-xml accepts `< a/>` as an element with an empty name
fn element_name<B>(bytes: &[u8], reader: &Reader<B>, lossy: bool) -> Result<String, quick_xml::Error> {
    let name = decode(bytes, reader, lossy)?;
    if name.is_empty() {
        return Err(quick_xml::Error::UnexpectedToken(
            "element without a name".to_string(),
        ));
    }
    Ok(name)
}

fn decode<B>(bytes: &[u8], reader: &Reader<B>, lossy: bool) -> Result<String, quick_xml::Error> {
    match reader.decoder().decode(bytes) {
        Ok(s) => Ok(s.into_owned()),
        Err(_) if lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Err(e) => Err(e),
    }
}

fn decode_attributes<B>(
    start: &BytesStart,
    reader: &Reader<B>,
    lossy: bool,
) -> Result<Vec<(String, String)>, quick_xml::Error> {
    let mut result = Vec::new();
    let mut attributes = start.attributes();
    attributes.with_checks(!lossy);
    for a in attributes {
        let a = match a {
            Ok(a) => a,
            Err(_) if lossy => break,
            Err(e) => return Err(quick_xml::Error::InvalidAttr(e)),
        };
        let key = decode(a.key.as_ref(), reader, lossy)?;
        if lossy && result.iter().any(|(k, _)| *k == key) {
            continue;
        }
        let value = match a.decode_and_unescape_value(reader) {
            Ok(v) => v.into_owned(),
            Err(_) if lossy => decode(&a.value, reader, true)?,
            Err(e) => return Err(e),
        };
        result.push((key, value));
    }
    Ok(result)
}
