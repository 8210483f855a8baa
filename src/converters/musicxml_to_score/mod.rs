//! MusicXML tree → Score Tree (pass 1)
//!
//! Only `score-partwise` documents are accepted. Every declared part admitted
//! by the configuration's part sets is scanned once, measure by measure;
//! what cannot be repaired is recorded in the run context rather than
//! aborting the scan, so one run reports every problem of the input.
//!
//! ## Layout
//! - **part_list**: identification, part groups, declared parts
//! - **attributes**: `<attributes>` and `<barline>`
//! - **directions**: `<direction>`
//! - **notes**: `<note>`
//! - **voice**: per-voice cursor and its states
//! - **builder**: the part scan itself

mod attributes;
mod builder;
mod directions;
mod notes;
mod part_list;
mod voice;

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use log::info;

use crate::context::RunContext;
use crate::errors::{ParseError, WarningKind};
use crate::ir::ScoreTree;
use crate::musicxml::MusicXmlTree;

use builder::PartBuilder;
use part_list::{build_part_list, parse_identification};

/// Build the score tree of a MusicXML document.
///
/// Fails only when the document is not a partwise score or lacks a part
/// list; semantic errors and warnings go to `context`.
pub fn build_score_tree(input: &MusicXmlTree, context: &mut RunContext) -> Result<ScoreTree, ParseError> {
    let root = &input.root;
    match root.name.as_str() {
        "score-partwise" => {}
        "score-timewise" => {
            return Err(ParseError::UnsupportedFormat(
                "score-timewise (use score-partwise instead)".to_string(),
            ))
        }
        other => {
            return Err(ParseError::UnsupportedFormat(format!(
                "root element <{}>, expected <score-partwise>",
                other
            )))
        }
    }

    let mut tree = ScoreTree::new(input.source_name.clone());
    tree.score_mut().line = root.line;
    tree.score_mut().identification = parse_identification(root);
    let declared = build_part_list(root, &mut tree, context)?;

    let mut scanned: HashSet<&str> = HashSet::new();
    let mut built: HashSet<&str> = HashSet::new();
    for part_element in root.children_named("part") {
        let Some(id) = part_element.attribute("id") else {
            context.warn(WarningKind::SkippedElement, part_element.line, "part without id");
            continue;
        };
        if declared.filtered.contains(id) {
            continue;
        }
        let Some(&part) = declared.parts.get(id) else {
            context.warn(
                WarningKind::SkippedElement,
                part_element.line,
                format!("part {} is not declared in the part list", id),
            );
            continue;
        };
        if !scanned.insert(id) {
            context.warn(
                WarningKind::SkippedElement,
                part_element.line,
                format!("part {} appears twice, second occurrence skipped", id),
            );
            continue;
        }
        if !part_element.has_child("measure") {
            continue;
        }
        PartBuilder::new(&mut tree, context, part, id).build(part_element);
        built.insert(id);
    }

    for part in tree.parts_in_order() {
        let part = tree.part(part);
        if !built.contains(part.id.as_str()) {
            context.warn(
                WarningKind::EmptyPart,
                part.line,
                format!("part {} has no measures", part.id),
            );
        }
    }

    info!(
        "built score tree for {}: {} part(s)",
        input.source_name,
        built.len()
    );
    Ok(tree)
}
