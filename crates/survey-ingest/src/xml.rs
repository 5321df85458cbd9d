//! Minimal XML element tree used by the structure parser.
//!
//! The questionnaire export is small (a few hundred kilobytes), so the
//! pull events from `quick-xml` are materialized into a tree and walked
//! recursively instead of threading parser state through every level.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};

use survey_model::{Result, SurveyError};

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Trimmed text of the first child with the given name, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.trim()).filter(|text| !text.is_empty())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = BTreeMap::new();
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|error| SurveyError::Structure(format!("bad attribute: {error}")))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|error| SurveyError::Structure(format!("bad attribute value: {error}")))?
            .into_owned();
        attributes.insert(key, value);
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

/// Expand a character reference (`&#169;`) or one of the five predefined
/// entities; anything else is malformed for this dialect.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String> {
    let char_ref = reference
        .resolve_char_ref()
        .map_err(|error| SurveyError::Structure(format!("bad character reference: {error}")))?;
    if let Some(resolved) = char_ref {
        return Ok(resolved.to_string());
    }
    let name = reference
        .decode()
        .map_err(|error| SurveyError::Structure(format!("bad entity reference: {error}")))?;
    let resolved = match name.as_ref() {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "apos" => "'",
        "quot" => "\"",
        other => {
            return Err(SurveyError::Structure(format!(
                "unknown entity reference '&{other};'"
            )));
        }
    };
    Ok(resolved.to_string())
}

/// Read an XML document into an element tree rooted at its top element.
pub fn read_document(path: &Path) -> Result<Element> {
    let mut reader = Reader::from_file(path)?;
    // Keep text as-is: entity references split a text node into separate
    // events, so trimming each fragment would eat the spaces around them.
    // Callers trim via `child_text` where whitespace is insignificant.
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                let text = text
                    .decode()
                    .map_err(|error| SurveyError::Structure(format!("bad text node: {error}")))?;
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&text);
                }
            }
            // Entity and character references arrive as their own events,
            // not as part of the surrounding text.
            Event::GeneralRef(reference) => {
                let resolved = resolve_reference(&reference)?;
                if let Some(element) = stack.last_mut() {
                    element.text.push_str(&resolved);
                }
            }
            Event::CData(data) => {
                if let Some(element) = stack.last_mut() {
                    element
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SurveyError::Structure("unbalanced closing tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Eof => {
                return Err(SurveyError::Structure(
                    "document ended before the root element was closed".to_string(),
                ));
            }
            // Declarations, comments, processing instructions and doctypes
            // carry no questionnaire content.
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_xml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write xml");
        file
    }

    #[test]
    fn reads_nested_elements_attributes_and_text() {
        let file = write_xml(
            r#"<?xml version="1.0"?>
            <questionnaire>
                <section id="1">
                    <sectionInfo><position>title</position><text>About &amp; you</text></sectionInfo>
                </section>
            </questionnaire>"#,
        );
        let root = read_document(file.path()).expect("parse");
        assert_eq!(root.name, "questionnaire");
        let section = root.child("section").expect("section");
        assert_eq!(section.attr("id"), Some("1"));
        let info = section.child("sectionInfo").expect("info");
        assert_eq!(info.child_text("position"), Some("title"));
        assert_eq!(info.child_text("text"), Some("About & you"));
    }

    #[test]
    fn entity_and_character_references_are_resolved() {
        let file = write_xml("<a><b>5 &lt; 6 &#38; 7 &gt; 4</b><c>&quot;ok&apos;</c></a>");
        let root = read_document(file.path()).expect("parse");
        assert_eq!(root.child_text("b"), Some("5 < 6 & 7 > 4"));
        assert_eq!(root.child_text("c"), Some("\"ok'"));
        let bad = write_xml("<a>&nbsp;</a>");
        assert!(read_document(bad.path()).is_err());
    }

    #[test]
    fn empty_elements_become_children() {
        let file = write_xml(r#"<a><b x="1"/><c></c></a>"#);
        let root = read_document(file.path()).expect("parse");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.child("b").and_then(|b| b.attr("x")), Some("1"));
        assert!(root.child("c").expect("c").text.is_empty());
    }

    #[test]
    fn truncated_document_is_fatal() {
        let file = write_xml("<a><b>");
        assert!(read_document(file.path()).is_err());
    }
}
