//! Owned MusicXML element tree
//!
//! The builder reads this tree and the MusicXML regenerator produces it, so a
//! score can go round trip without touching XML text in between.

use std::str::FromStr;

/// One XML element: name, attributes in document order, direct text, children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MusicXmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Trimmed text directly inside the element, if any
    pub text: Option<String>,
    pub children: Vec<MusicXmlElement>,
    /// Source line, 0 for generated elements
    pub line: usize,
}

impl MusicXmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Element holding only text, e.g. `<step>C</step>`
    pub fn text_element(name: impl Into<String>, text: impl ToString) -> Self {
        Self::new(name).with_text(text)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((name.into(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: impl ToString) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_child(mut self, child: MusicXmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: MusicXmlElement) {
        self.children.push(child);
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute parsed into `T`, `None` if missing or unparsable
    pub fn attribute_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.attribute(name).and_then(|v| v.trim().parse().ok())
    }

    /// Get first child element with given name
    pub fn child(&self, name: &str) -> Option<&MusicXmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MusicXmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Get text content of first child with given name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.text.as_deref())
    }

    /// Child text parsed into `T`, `None` if missing or unparsable
    pub fn child_text_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.child_text(name).and_then(|t| t.trim().parse().ok())
    }

    /// Follow a path of child names, e.g. `["notations", "tied"]`
    pub fn descendant(&self, path: &[&str]) -> Option<&MusicXmlElement> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }
}

/// A whole MusicXML document with the name of the source it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicXmlTree {
    pub source_name: String,
    pub root: MusicXmlElement,
}

impl MusicXmlTree {
    pub fn new(source_name: impl Into<String>, root: MusicXmlElement) -> Self {
        Self {
            source_name: source_name.into(),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_lookup_helpers() {
        let note = MusicXmlElement::new("note")
            .with_attribute("default-x", "12.5")
            .with_child(
                MusicXmlElement::new("pitch")
                    .with_child(MusicXmlElement::text_element("step", "C"))
                    .with_child(MusicXmlElement::text_element("octave", 4)),
            )
            .with_child(MusicXmlElement::text_element("duration", 2));

        assert_eq!(note.attribute_as::<f32>("default-x"), Some(12.5));
        assert_eq!(note.child_text_as::<i64>("duration"), Some(2));
        assert_eq!(
            note.descendant(&["pitch", "octave"]).and_then(|o| o.text.as_deref()),
            Some("4")
        );
        assert!(note.child("rest").is_none());
    }
}
