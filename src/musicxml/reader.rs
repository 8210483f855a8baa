//! XML parsing layer: roxmltree document → [`MusicXmlTree`]
//!
//! roxmltree does the lexing; this module only copies its nodes into the
//! owned tree, keeping element names, attributes, direct text and the source
//! line of every element. DTDs are accepted (MusicXML files carry a
//! DOCTYPE) but never fetched.

use log::debug;
use roxmltree::{Document, Node, ParsingOptions};

use super::tree::{MusicXmlElement, MusicXmlTree};
use crate::errors::ParseError;

/// Parse MusicXML text into an owned element tree
pub fn read_musicxml(source_name: &str, xml: &str) -> Result<MusicXmlTree, ParseError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ParseError::InvalidXml(format!("XML parse error: {}", e)))?;

    let root = convert_node(&doc, doc.root_element());
    debug!(
        "read {} <{}> with {} top-level children",
        source_name,
        root.name,
        root.children.len()
    );
    Ok(MusicXmlTree::new(source_name, root))
}

fn convert_node(doc: &Document, node: Node) -> MusicXmlElement {
    let line = doc.text_pos_at(node.range().start).row as usize;
    let attributes = node
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();

    let mut text = String::new();
    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(convert_node(doc, child));
        } else if child.is_text() {
            if let Some(t) = child.text() {
                text.push_str(t);
            }
        }
    }
    let trimmed = text.trim();

    MusicXmlElement {
        name: node.tag_name().name().to_string(),
        attributes,
        text: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        children,
        line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_doctype_and_line_numbers() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN"
  "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="4.0">
  <part-list>
    <score-part id="P1"><part-name>Piano</part-name></score-part>
  </part-list>
</score-partwise>"#;
        let tree = read_musicxml("doc.xml", xml).unwrap();
        assert_eq!(tree.root.name, "score-partwise");
        assert_eq!(tree.root.attribute("version"), Some("4.0"));
        assert_eq!(tree.root.line, 4);
        let part = tree.root.descendant(&["part-list", "score-part"]).unwrap();
        assert_eq!(part.line, 6);
        assert_eq!(part.child_text("part-name"), Some("Piano"));
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let err = read_musicxml("bad.xml", "<score-partwise><part></score-partwise>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidXml(_)));
    }
}
