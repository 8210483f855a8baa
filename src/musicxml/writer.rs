//! [`MusicXmlTree`] → MusicXML text through quick-xml's `Writer`

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use super::tree::{MusicXmlElement, MusicXmlTree};

const PARTWISE_DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("XML write failed: {0}")]
    Xml(String),

    #[error("Generated XML is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Serialize a tree as an indented MusicXML document
pub fn write_musicxml(tree: &MusicXmlTree) -> Result<String, WriteError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))
        .map_err(|e| WriteError::Xml(e.to_string()))?;
    if tree.root.name == "score-partwise" {
        writer
            .write_event(Event::DocType(BytesText::from_escaped(PARTWISE_DOCTYPE)))
            .map_err(|e| WriteError::Xml(e.to_string()))?;
    }
    write_element(&mut writer, &tree.root)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &MusicXmlElement) -> Result<(), WriteError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| WriteError::Xml(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| WriteError::Xml(e.to_string()))?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| WriteError::Xml(e.to_string()))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| WriteError::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::musicxml::reader::read_musicxml;

    #[test]
    fn test_written_text_reads_back_equal() {
        let root = MusicXmlElement::new("score-partwise")
            .with_attribute("version", "4.0")
            .with_child(
                MusicXmlElement::new("work")
                    .with_child(MusicXmlElement::text_element("work-title", "Fish & Chips")),
            )
            .with_child(MusicXmlElement::new("part").with_attribute("id", "P1"));
        let tree = MusicXmlTree::new("generated", root);

        let text = write_musicxml(&tree).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<!DOCTYPE score-partwise"));
        assert!(text.contains("Fish &amp; Chips"));
        assert!(text.contains(r#"<part id="P1"/>"#));

        let back = read_musicxml("generated", &text).unwrap();
        let title = back.root.descendant(&["work", "work-title"]).unwrap();
        assert_eq!(title.text.as_deref(), Some("Fish & Chips"));
    }
}
