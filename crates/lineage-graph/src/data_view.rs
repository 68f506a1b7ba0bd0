//! Transformation of the process graph into the data-centric bipartite view.

use std::collections::{BTreeSet, HashMap};

use lineage_types::{data_id, normalize_uri, process_id, Locator};

use crate::graph::{
    DataGraph, DataNode, DataNodeMeta, DataViewNode, Edge, EdgeKind, ProcessGraph, ProcessViewNode,
};

/// Rewrite the process graph as a bipartite process↔data graph.
///
/// Data nodes are created lazily and deduplicated on the same normalized-URI
/// key as artifacts; matching artifact storage metadata is copied onto the
/// data node. The transform is pure: repeated invocations over the same input
/// produce identical output.
pub fn to_data_view(graph: &ProcessGraph) -> DataGraph {
    let artifact_by_key: HashMap<String, usize> = graph
        .artifacts
        .iter()
        .enumerate()
        .map(|(idx, a)| (normalize_uri(&a.uri), idx))
        .collect();

    // Insertion-ordered data-node table keyed by data id.
    let mut data_order: Vec<String> = Vec::new();
    let mut data_nodes: HashMap<String, DataNode> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();

    let ensure_data_node = |uri: &str,
                                data_order: &mut Vec<String>,
                                data_nodes: &mut HashMap<String, DataNode>|
     -> String {
        let id = data_id(uri);
        if !data_nodes.contains_key(&id) {
            let meta = match artifact_by_key.get(&normalize_uri(uri)) {
                Some(&idx) => {
                    let artifact = &graph.artifacts[idx];
                    DataNodeMeta {
                        bucket: artifact.bucket.clone(),
                        key: artifact.key.clone(),
                        storage: artifact.storage.clone(),
                    }
                }
                None => DataNodeMeta::default(),
            };
            data_nodes.insert(
                id.clone(),
                DataNode {
                    id: id.clone(),
                    label: uri.to_string(),
                    uri: uri.to_string(),
                    meta,
                },
            );
            data_order.push(id.clone());
        }
        id
    };

    let mut process_nodes: Vec<ProcessViewNode> = Vec::with_capacity(graph.nodes.len());

    for node in &graph.nodes {
        let pid = process_id(&node.id);
        process_nodes.push(ProcessViewNode {
            id: pid.clone(),
            label: node.label.clone(),
            step_id: node.id.clone(),
            step_type: node.step_type.clone(),
            run: node.run.clone(),
            registry: node.registry.clone(),
        });

        for slot in &node.inputs {
            if let Locator::Uri(uri) = &slot.locator {
                let did = ensure_data_node(uri, &mut data_order, &mut data_nodes);
                edges.push(Edge::new(did, pid.clone(), EdgeKind::Read));
            }
        }
        for slot in &node.outputs {
            if let Locator::Uri(uri) = &slot.locator {
                let did = ensure_data_node(uri, &mut data_order, &mut data_nodes);
                edges.push(Edge::new(pid.clone(), did, EdgeKind::Write));
            }
        }
    }

    link_derivations(&mut edges);

    let mut nodes: Vec<DataViewNode> = data_order
        .into_iter()
        .filter_map(|id| data_nodes.remove(&id))
        .map(DataViewNode::Data)
        .collect();
    nodes.extend(process_nodes.into_iter().map(DataViewNode::Process));

    DataGraph { nodes, edges }
}

/// Mark every data node that is both written and read somewhere in the
/// pipeline with a self-referencing `derived` edge.
fn link_derivations(edges: &mut Vec<Edge>) {
    let written: BTreeSet<&String> = edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Write)
        .map(|e| &e.target)
        .collect();
    let read: BTreeSet<&String> = edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Read)
        .map(|e| &e.source)
        .collect();

    let derived: Vec<String> = written.intersection(&read).map(|s| (*s).clone()).collect();
    for id in derived {
        edges.push(Edge::new(id.clone(), id, EdgeKind::Derived));
    }
}
