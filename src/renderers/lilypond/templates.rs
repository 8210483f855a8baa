//! LilyPond document templates
//!
//! Mustache templates hold the document skeleton; the music is rendered
//! into the `staves` field. Templates contain no Scheme expressions, so the
//! output passes restricted rendering services.
//!
//! - `Minimal`: version, language and score block only
//! - `Standard`: adds a `\header` block with title, composer and friends

use serde::Serialize;

use super::super::RenderError;

/// Template selection for LilyPond output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LilyPondTemplate {
    /// No header block
    Minimal,
    /// Header block with whatever metadata is known
    Standard,
}

/// One `\header` assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderField {
    pub key: &'static str,
    /// Already escaped
    pub value: String,
}

/// Context data for template rendering
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// LilyPond version (e.g., "2.24.0")
    pub version: String,

    /// `\language` name (e.g., "nederlands")
    pub language: String,

    /// Header assignments in output order
    pub header: Vec<HeaderField>,

    /// Rendered staff and group contexts
    pub staves: String,
}

impl TemplateContext {
    pub fn new(version: String, language: String, staves: String) -> Self {
        Self {
            version,
            language,
            header: Vec::new(),
            staves,
        }
    }

    pub fn builder(version: String, language: String, staves: String) -> TemplateContextBuilder {
        TemplateContextBuilder::new(version, language, staves)
    }

    pub fn has_header(&self) -> bool {
        !self.header.is_empty()
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.header.iter().find(|f| f.key == key).map(|f| f.value.as_str())
    }
}

/// Builder for TemplateContext
pub struct TemplateContextBuilder {
    context: TemplateContext,
}

impl TemplateContextBuilder {
    pub fn new(version: String, language: String, staves: String) -> Self {
        Self {
            context: TemplateContext::new(version, language, staves),
        }
    }

    fn field(mut self, key: &'static str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.context.header.push(HeaderField { key, value });
        }
        self
    }

    pub fn title(self, title: Option<String>) -> Self {
        self.field("title", title)
    }

    pub fn subtitle(self, subtitle: Option<String>) -> Self {
        self.field("subtitle", subtitle)
    }

    pub fn composer(self, composer: Option<String>) -> Self {
        self.field("composer", composer)
    }

    pub fn arranger(self, arranger: Option<String>) -> Self {
        self.field("arranger", arranger)
    }

    pub fn copyright(self, copyright: Option<String>) -> Self {
        self.field("copyright", copyright)
    }

    pub fn build(self) -> TemplateContext {
        self.context
    }
}

/// Get template content by type
pub fn get_template_content(template_type: LilyPondTemplate) -> &'static str {
    match template_type {
        LilyPondTemplate::Minimal => include_str!("templates/minimal.ly.mustache"),
        LilyPondTemplate::Standard => include_str!("templates/standard.ly.mustache"),
    }
}

/// Render a LilyPond document using a template
pub fn render_lilypond(template_type: LilyPondTemplate, context: &TemplateContext) -> Result<String, RenderError> {
    let template = mustache::compile_str(get_template_content(template_type))?;
    Ok(template.render_to_string(context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContextBuilder {
        TemplateContext::builder("2.24.0".to_string(), "english".to_string(), "    c4 d4 e4".to_string())
    }

    #[test]
    fn test_template_context_builder() {
        let context = context()
            .title(Some("Test Song".to_string()))
            .composer(Some("Test Composer".to_string()))
            .build();
        assert_eq!(context.version, "2.24.0");
        assert_eq!(context.header_value("title"), Some("Test Song"));
        assert_eq!(context.header_value("composer"), Some("Test Composer"));
        assert!(context.has_header());
        assert!(!TemplateContext::new("2.24.0".into(), "english".into(), String::new()).has_header());
    }

    #[test]
    fn test_render_minimal_template() {
        let rendered = render_lilypond(LilyPondTemplate::Minimal, &context().build()).unwrap();
        assert!(rendered.starts_with("\\version \"2.24.0\"\n\\language \"english\""));
        assert!(rendered.contains("c4 d4 e4"));
        assert!(!rendered.contains("\\header"));
    }

    #[test]
    fn test_render_standard_template_keeps_music_unescaped() {
        let context = TemplateContext::builder("2.24.0".into(), "english".into(), "    <c e>4 \\< d8 -> \\!".into())
            .title(Some("My \\\"Song\\\"".to_string()))
            .build();
        let rendered = render_lilypond(LilyPondTemplate::Standard, &context).unwrap();
        assert!(rendered.contains("  title = \"My \\\"Song\\\"\"\n"));
        assert!(rendered.contains("<c e>4 \\< d8 -> \\!"));
        assert!(!rendered.contains("composer"));
    }
}
