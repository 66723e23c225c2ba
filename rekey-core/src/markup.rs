//! Link rewriting inside embedded XHTML narratives.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};

/// Result of rewriting the links of one narrative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupOutcome {
    /// The document parsed; this is its re-serialized form.
    Rewritten(String),
    /// The document is not well-formed markup and was left as it was.
    Unparseable,
}

/// Passes every `a@href` and `img@src` value in `div` through `resolve` and
/// re-serializes the document.
///
/// The whole document is parsed before `resolve` is called for the first
/// time, so a malformed document yields [`MarkupOutcome::Unparseable`] and
/// never a resolution error. Errors from `resolve` are returned as-is.
pub fn rewrite_links<E, F>(div: &str, mut resolve: F) -> Result<MarkupOutcome, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let Some(events) = parse(div) else {
        return Ok(MarkupOutcome::Unparseable);
    };

    let mut writer = Writer::new(Vec::with_capacity(div.len()));
    for event in events {
        let event = match event {
            Event::Start(e) => match rewrite_element(e, &mut resolve)? {
                Some(e) => Event::Start(e),
                None => return Ok(MarkupOutcome::Unparseable),
            },
            Event::Empty(e) => match rewrite_element(e, &mut resolve)? {
                Some(e) => Event::Empty(e),
                None => return Ok(MarkupOutcome::Unparseable),
            },
            other => other,
        };
        if writer.write_event(event).is_err() {
            return Ok(MarkupOutcome::Unparseable);
        }
    }

    Ok(match String::from_utf8(writer.into_inner()) {
        Ok(rewritten) => MarkupOutcome::Rewritten(rewritten),
        Err(_) => MarkupOutcome::Unparseable,
    })
}

/// Reads the whole document, requiring one root element, balanced tags,
/// well-formed attributes and no text outside the root.
fn parse(div: &str) -> Option<Vec<Event<'static>>> {
    let mut reader = Reader::from_str(div);
    let mut events = Vec::new();
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let event = reader.read_event().ok()?;
        match &event {
            Event::Start(e) | Event::Empty(e) => {
                if depth == 0 {
                    roots += 1;
                }
                if !attributes_well_formed(e) {
                    return None;
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.checked_sub(1)?,
            Event::Text(text) if depth == 0 => {
                if text.iter().any(|b| !b.is_ascii_whitespace()) {
                    return None;
                }
            }
            Event::CData(_) if depth == 0 => return None,
            Event::Eof => break,
            _ => {}
        }
        events.push(event.into_owned());
    }

    (depth == 0 && roots == 1).then_some(events)
}

fn attributes_well_formed(element: &BytesStart<'_>) -> bool {
    element
        .attributes()
        .all(|attr| attr.is_ok_and(|a| a.unescape_value().is_ok()))
}

/// The attribute holding a link target for the given element, if any.
fn link_attribute(element: &[u8]) -> Option<&'static [u8]> {
    match element {
        b"a" => Some(b"href"),
        b"img" => Some(b"src"),
        _ => None,
    }
}

/// Rebuilds a link-bearing element with its target resolved.
///
/// `Ok(None)` means the element could not be decoded after all.
fn rewrite_element<E, F>(
    element: BytesStart<'static>,
    resolve: &mut F,
) -> Result<Option<BytesStart<'static>>, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let target = link_attribute(element.local_name().as_ref());
    let Some(target) = target else {
        return Ok(Some(element));
    };

    let mut rewritten = element.clone();
    rewritten.clear_attributes();
    for attr in element.attributes() {
        let Ok(attr) = attr else { return Ok(None) };
        let Ok(key) = std::str::from_utf8(attr.key.as_ref()) else {
            return Ok(None);
        };
        let Ok(value) = attr.unescape_value() else {
            return Ok(None);
        };
        if attr.key.local_name().as_ref() == target {
            let resolved = resolve(value.as_ref())?;
            rewritten.push_attribute((key, resolved.as_str()));
        } else {
            rewritten.push_attribute((key, value.as_ref()));
        }
    }
    Ok(Some(rewritten))
}
