//! Lineage graph engine for declarative ML pipeline definitions.
//!
//! This crate implements the core lineage builder: step IO normalization,
//! process-DAG construction with a deduplicated artifact index, the bipartite
//! data view, edge dedup and labeling, and the fault-tolerant telemetry and
//! storage-security enrichment passes.

pub mod builder;
pub mod data_view;
pub mod dedupe;
pub mod engine;
pub mod graph;
pub mod normalize;
pub mod options;
pub mod report;
pub mod storage;
pub mod summary;
pub mod telemetry;

pub use builder::{build_graph, collect_artifacts, ArtifactIndex};
pub use data_view::to_data_view;
pub use dedupe::dedupe_and_label_edges;
pub use engine::{GraphView, LineageEngine, LineageReport};
pub use graph::{
    DataGraph, DataNode, DataNodeMeta, DataViewNode, Edge, EdgeKind, ProcessGraph, ProcessNode,
    ProcessViewNode,
};
pub use normalize::normalize_step_io;
pub use options::EnrichOptions;
pub use report::enrich_report_metrics;
pub use storage::{enrich_storage_meta, StorageProvider};
pub use summary::{pipeline_summary, PipelineSummary};
pub use telemetry::{enrich_with_latest_execution, ExecutionProvider};
