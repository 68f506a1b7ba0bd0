//! Process graph construction from a pipeline definition.

use std::collections::HashMap;

use lineage_types::{normalize_uri, Artifact, Locator, PipelineDefinition};

use crate::graph::{Edge, EdgeKind, ProcessGraph, ProcessNode};
use crate::normalize::normalize_step_io;

/// Deduplicating artifact registry, keyed by normalized URI. Owned by one
/// graph build; first registration wins and assigns the next integer id.
#[derive(Debug, Default)]
pub struct ArtifactIndex {
    by_key: HashMap<String, usize>,
    artifacts: Vec<Artifact>,
}

impl ArtifactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a URI, reusing the existing artifact when one with the same
    /// normalized key is already present.
    pub fn register(&mut self, uri: &str) -> usize {
        let key = normalize_uri(uri);
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        let id = self.artifacts.len();
        self.by_key.insert(key, id);
        self.artifacts.push(Artifact::new(id, uri));
        id
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

/// Re-derive the artifact list from every node's current inputs/outputs.
/// Used after telemetry enrichment rewrites node IO.
pub fn collect_artifacts(nodes: &[ProcessNode]) -> Vec<Artifact> {
    let mut index = ArtifactIndex::new();
    for node in nodes {
        for slot in node.inputs.iter().chain(node.outputs.iter()) {
            if let Locator::Uri(uri) = &slot.locator {
                index.register(uri);
            }
        }
    }
    index.into_artifacts()
}

/// Build the process-centric graph: one node per step, `dependsOn` edges from
/// explicit declarations, `ref` edges from symbolic locators, and the
/// deduplicated artifact index.
///
/// Malformed steps (no name) are skipped rather than failing the build; no
/// cycle detection is performed, the definition is assumed to encode a DAG.
pub fn build_graph(def: &PipelineDefinition) -> ProcessGraph {
    let mut nodes: Vec<ProcessNode> = Vec::with_capacity(def.steps.len());
    let mut edges: Vec<Edge> = Vec::new();
    let mut index = ArtifactIndex::new();

    for step in &def.steps {
        let Some(node_id) = step.name.as_deref().filter(|n| !n.is_empty()) else {
            tracing::warn!(step_type = %step.step_type, "skipping step without a name");
            continue;
        };

        let (inputs, outputs) = normalize_step_io(step);

        for prev in step.depends_on.to_vec() {
            if !prev.is_empty() {
                edges.push(Edge::new(prev, node_id, EdgeKind::DependsOn));
            }
        }

        for slot in inputs.iter().chain(outputs.iter()) {
            match &slot.locator {
                Locator::Uri(uri) => {
                    index.register(uri);
                }
                Locator::StepRef(source) => {
                    edges.push(Edge::new(source.clone(), node_id, EdgeKind::Ref));
                }
            }
        }

        nodes.push(ProcessNode {
            id: node_id.to_string(),
            step_type: step.step_type.clone(),
            label: node_id.to_string(),
            inputs,
            outputs,
            run: None,
            registry: None,
        });
    }

    ProcessGraph {
        nodes,
        edges,
        artifacts: index.into_artifacts(),
    }
}
