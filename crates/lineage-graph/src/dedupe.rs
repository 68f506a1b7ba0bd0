//! Edge deduplication and label cleanup for the process graph.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::graph::{EdgeKind, ProcessGraph};

/// Drop duplicate edges and attach display labels.
///
/// Two edges are duplicates iff `(source, target, kind)` match; the first
/// occurrence wins. Each surviving `dependsOn`/`ref` edge is labeled with up
/// to two of the target step's input names, skipping the generic `code`
/// artifact and `input-<n>` placeholder names. Edges with no qualifying names
/// stay unlabeled.
pub fn dedupe_and_label_edges(graph: &mut ProcessGraph) {
    let input_names: HashMap<&str, Vec<&str>> = graph
        .nodes
        .iter()
        .map(|n| {
            (
                n.id.as_str(),
                n.inputs.iter().map(|slot| slot.name.as_str()).collect(),
            )
        })
        .collect();

    let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
    let mut deduped = Vec::with_capacity(graph.edges.len());

    for mut edge in graph.edges.drain(..) {
        let key = (edge.source.clone(), edge.target.clone(), edge.kind);
        if !seen.insert(key) {
            continue;
        }
        if matches!(edge.kind, EdgeKind::DependsOn | EdgeKind::Ref) {
            edge.label = label_for(&edge.target, &input_names);
        }
        deduped.push(edge);
    }

    graph.edges = deduped;
}

fn label_for(target: &str, input_names: &HashMap<&str, Vec<&str>>) -> Option<String> {
    let names: BTreeSet<&str> = input_names
        .get(target)?
        .iter()
        .copied()
        .filter(|name| *name != "code" && !name.starts_with("input-"))
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(names.into_iter().take(2).collect::<Vec<_>>().join(", "))
}
