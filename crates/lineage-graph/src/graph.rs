//! Graph value types: the process-centric pipeline graph and the
//! data-centric bipartite view derived from it.

use serde::{Deserialize, Serialize};

use lineage_types::{Artifact, IoSlot, RegistryInfo, RunInfo, StorageMeta};

/// Edge kinds across both graph views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    DependsOn,
    Ref,
    Read,
    Write,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            label: None,
        }
    }
}

/// One step of the pipeline, carrying its normalized IO and optional run
/// telemetry. Mutated only by the telemetry enricher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessNode {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub label: String,
    pub inputs: Vec<IoSlot>,
    pub outputs: Vec<IoSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryInfo>,
}

/// Process-centric pipeline graph: one node per step, dependsOn/ref edges,
/// and the deduplicated artifact index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessGraph {
    pub nodes: Vec<ProcessNode>,
    pub edges: Vec<Edge>,
    pub artifacts: Vec<Artifact>,
}

impl ProcessGraph {
    pub fn node(&self, id: &str) -> Option<&ProcessNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ProcessNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn has_edge(&self, source: &str, target: &str, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Data-centric (bipartite) view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataNodeMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageMeta>,
}

/// Bipartite projection of one artifact (`id = "data:" + normalized URI`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNode {
    pub id: String,
    pub label: String,
    pub uri: String,
    pub meta: DataNodeMeta,
}

/// Bipartite projection of one process node (`id = "process:" + step id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessViewNode {
    pub id: String,
    pub label: String,
    pub step_id: String,
    pub step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataViewNode {
    #[serde(rename = "dataArtifact")]
    Data(DataNode),
    #[serde(rename = "processNode")]
    Process(ProcessViewNode),
}

/// Data-centric bipartite graph: data nodes and process nodes connected by
/// read/write edges, plus derived self-markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataGraph {
    pub nodes: Vec<DataViewNode>,
    pub edges: Vec<Edge>,
}

impl DataGraph {
    pub fn data_node(&self, id: &str) -> Option<&DataNode> {
        self.nodes.iter().find_map(|n| match n {
            DataViewNode::Data(d) if d.id == id => Some(d),
            _ => None,
        })
    }

    pub fn data_nodes(&self) -> impl Iterator<Item = &DataNode> {
        self.nodes.iter().filter_map(|n| match n {
            DataViewNode::Data(d) => Some(d),
            _ => None,
        })
    }

    pub fn has_edge(&self, source: &str, target: &str, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.kind == kind)
    }
}
