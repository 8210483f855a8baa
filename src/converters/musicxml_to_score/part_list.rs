//! Identification and `<part-list>`: part groups and declared parts

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::context::RunContext;
use crate::errors::{ParseError, WarningKind};
use crate::ir::{GroupSymbol, Identification, PartGroup, PartGroupId, PartId, ScoreTree};
use crate::musicxml::MusicXmlElement;

/// Declared parts, by `id` attribute
#[derive(Debug, Default)]
pub(super) struct DeclaredParts {
    pub parts: HashMap<String, PartId>,
    /// Declared but excluded by the part sets of the configuration
    pub filtered: HashSet<String>,
}

pub(super) fn parse_identification(root: &MusicXmlElement) -> Identification {
    let mut identification = Identification {
        work_title: root
            .descendant(&["work", "work-title"])
            .and_then(|t| t.text.clone()),
        movement_title: root.child_text("movement-title").map(str::to_string),
        ..Identification::default()
    };
    if let Some(ident) = root.child("identification") {
        for creator in ident.children_named("creator") {
            let Some(text) = creator.text.clone() else {
                continue;
            };
            match creator.attribute("type") {
                Some("arranger") => identification.arrangers.push(text),
                // composer, and untyped creators
                Some("composer") | None => identification.composers.push(text),
                Some(other) => debug!("creator type {:?} not kept", other),
            }
        }
        identification
            .rights
            .extend(ident.children_named("rights").filter_map(|r| r.text.clone()));
        if let Some(encoding) = ident.child("encoding") {
            identification
                .software
                .extend(encoding.children_named("software").filter_map(|s| s.text.clone()));
        }
    }
    identification
}

/// Create the part groups and parts declared by `<part-list>`.
///
/// Parts always live inside one implicit outer group; explicit groups nest
/// inside it in start/stop order.
pub(super) fn build_part_list(
    root: &MusicXmlElement,
    tree: &mut ScoreTree,
    context: &mut RunContext,
) -> Result<DeclaredParts, ParseError> {
    let part_list = root
        .child("part-list")
        .ok_or_else(|| ParseError::MissingRequiredElement("part-list".to_string()))?;

    let outer = tree.add_part_group(None, PartGroup::implicit());
    let mut open: Vec<(u32, PartGroupId)> = Vec::new();
    let mut declared = DeclaredParts::default();

    for entry in &part_list.children {
        match entry.name.as_str() {
            "part-group" => {
                let number = entry.attribute_as::<u32>("number").unwrap_or(1);
                match entry.attribute("type") {
                    Some("start") => {
                        let parent = open.last().map(|(_, g)| *g).unwrap_or(outer);
                        let group = PartGroup {
                            line: entry.line,
                            number,
                            name: entry.child_text("group-name").map(str::to_string),
                            symbol: entry
                                .child_text("group-symbol")
                                .and_then(GroupSymbol::from_musicxml)
                                .unwrap_or(GroupSymbol::None),
                            barline: entry.child_text("group-barline") == Some("yes"),
                            implicit: false,
                            elements: Vec::new(),
                            uplink: None,
                        };
                        let id = tree.add_part_group(Some(parent), group);
                        open.push((number, id));
                    }
                    Some("stop") => match open.iter().rposition(|(n, _)| *n == number) {
                        Some(index) => {
                            open.remove(index);
                        }
                        None => context.warn(
                            WarningKind::OrphanStop,
                            entry.line,
                            format!("part group {} stopped but never started", number),
                        ),
                    },
                    _ => context.warn(
                        WarningKind::SkippedElement,
                        entry.line,
                        "part-group without a start or stop type",
                    ),
                }
            }
            "score-part" => {
                let Some(id) = entry.attribute("id") else {
                    context.warn(WarningKind::SkippedElement, entry.line, "score-part without id");
                    continue;
                };
                let name = entry.child_text("part-name").map(str::to_string);
                let admitted = context
                    .config()
                    .parts
                    .admits_any([id.to_string(), name.clone().unwrap_or_default()].iter());
                if !admitted {
                    debug!("part {} excluded by configuration", id);
                    declared.filtered.insert(id.to_string());
                    continue;
                }
                let group = open.last().map(|(_, g)| *g).unwrap_or(outer);
                let part = tree.add_part(group, id, entry.line);
                let p = tree.part_mut(part);
                p.name = name;
                p.abbreviation = entry.child_text("part-abbreviation").map(str::to_string);
                declared.parts.insert(id.to_string(), part);
            }
            _ => {}
        }
    }
    for (number, group) in open {
        context.warn(
            WarningKind::OrphanStart,
            tree.part_group(group).line,
            format!("part group {} never stopped", number),
        );
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterSets, RunConfig};
    use crate::ir::PartGroupElement;
    use crate::musicxml::read_musicxml;

    const PART_LIST: &str = r#"<score-partwise>
      <work><work-title>Sonata</work-title></work>
      <identification>
        <creator type="composer">A. Composer</creator>
        <rights>public domain</rights>
        <encoding><software>Finale</software></encoding>
      </identification>
      <part-list>
        <part-group type="start" number="1"><group-symbol>brace</group-symbol><group-barline>yes</group-barline></part-group>
        <score-part id="P1"><part-name>Right</part-name></score-part>
        <score-part id="P2"><part-name>Left</part-name></score-part>
        <part-group type="stop" number="1"/>
        <score-part id="P3"><part-name>Voice</part-name></score-part>
      </part-list>
    </score-partwise>"#;

    #[test]
    fn test_identification() {
        let root = read_musicxml("ident", PART_LIST).unwrap().root;
        let identification = parse_identification(&root);
        assert_eq!(identification.title(), Some("Sonata"));
        assert_eq!(identification.composers, vec!["A. Composer".to_string()]);
        assert_eq!(identification.software, vec!["Finale".to_string()]);
    }

    #[test]
    fn test_groups_nest_inside_implicit_group() {
        let root = read_musicxml("groups", PART_LIST).unwrap().root;
        let mut tree = ScoreTree::new("groups");
        let mut context = RunContext::new(RunConfig::default());
        let declared = build_part_list(&root, &mut tree, &mut context).unwrap();
        assert_eq!(declared.parts.len(), 3);

        let outer = tree.score().part_groups[0];
        assert!(tree.part_group(outer).implicit);
        let elements = &tree.part_group(outer).elements;
        assert_eq!(elements.len(), 2);
        let PartGroupElement::PartGroup(brace) = elements[0] else {
            panic!("expected a nested group first");
        };
        assert_eq!(tree.part_group(brace).symbol, GroupSymbol::Brace);
        assert!(tree.part_group(brace).barline);
        let order: Vec<&str> = tree
            .parts_in_order()
            .into_iter()
            .map(|p| tree.part(p).id.as_str())
            .collect();
        assert_eq!(order, vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn test_part_sets_filter_by_id_or_name() {
        let root = read_musicxml("filtered", PART_LIST).unwrap().root;
        let mut tree = ScoreTree::new("filtered");
        let config = RunConfig {
            parts: FilterSets::keep_only(vec!["Voice".to_string(), "P1".to_string()]),
            ..RunConfig::default()
        };
        let mut context = RunContext::new(config);
        let declared = build_part_list(&root, &mut tree, &mut context).unwrap();
        assert!(declared.parts.contains_key("P1"));
        assert!(declared.parts.contains_key("P3"));
        assert!(declared.filtered.contains("P2"));
    }

    #[test]
    fn test_missing_part_list() {
        let root = read_musicxml("none", "<score-partwise/>").unwrap().root;
        let mut tree = ScoreTree::new("none");
        let mut context = RunContext::new(RunConfig::default());
        assert_eq!(
            build_part_list(&root, &mut tree, &mut context).unwrap_err(),
            ParseError::MissingRequiredElement("part-list".into())
        );
    }
}
