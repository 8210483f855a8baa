//! MusicXML element tree, its roxmltree reader and its quick-xml writer

pub mod reader;
pub mod tree;
pub mod writer;

pub use reader::read_musicxml;
pub use tree::{MusicXmlElement, MusicXmlTree};
pub use writer::{write_musicxml, WriteError};
