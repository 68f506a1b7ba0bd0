//! Engine facade tying definition parsing, graph building, enrichment, and
//! the two graph views together behind one call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lineage_types::{EnrichmentWarning, PipelineDefinition};

use crate::builder::build_graph;
use crate::data_view::to_data_view;
use crate::dedupe::dedupe_and_label_edges;
use crate::graph::{DataGraph, ProcessGraph};
use crate::options::EnrichOptions;
use crate::report::enrich_report_metrics;
use crate::storage::{enrich_storage_meta, StorageProvider};
use crate::summary::{pipeline_summary, PipelineSummary};
use crate::telemetry::{enrich_with_latest_execution, ExecutionProvider};

/// Which graph views a build should include in its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphView {
    Pipeline,
    Data,
    #[default]
    Both,
}

/// Everything one build produces: the requested views, the status roll-up,
/// and every degradation hit along the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<ProcessGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataGraph>,
    pub summary: PipelineSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EnrichmentWarning>,
}

/// Builds lineage reports from pipeline definitions. Providers are optional:
/// without them the engine still produces the full definition-time graph,
/// just without telemetry or storage metadata.
#[derive(Default)]
pub struct LineageEngine {
    execution: Option<Arc<dyn ExecutionProvider>>,
    storage: Option<Arc<dyn StorageProvider>>,
    opts: EnrichOptions,
}

impl LineageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution(mut self, provider: Arc<dyn ExecutionProvider>) -> Self {
        self.execution = Some(provider);
        self
    }

    pub fn with_storage(mut self, provider: Arc<dyn StorageProvider>) -> Self {
        self.storage = Some(provider);
        self
    }

    pub fn with_options(mut self, opts: EnrichOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Build the lineage report for one pipeline.
    ///
    /// The build itself never fails: a definition with no usable steps yields
    /// an empty graph, and every enrichment degradation lands in
    /// `warnings` instead of aborting.
    pub async fn build(
        &self,
        definition: &PipelineDefinition,
        pipeline_name: &str,
        view: GraphView,
    ) -> LineageReport {
        let mut graph = build_graph(definition);
        let mut warnings = Vec::new();

        if let Some(execution) = &self.execution {
            warnings.extend(
                enrich_with_latest_execution(&mut graph, execution.as_ref(), pipeline_name, &self.opts)
                    .await,
            );
        }

        dedupe_and_label_edges(&mut graph);

        if let Some(storage) = &self.storage {
            warnings
                .extend(enrich_report_metrics(&mut graph, Arc::clone(storage), &self.opts).await);
            warnings
                .extend(enrich_storage_meta(&mut graph, Arc::clone(storage), &self.opts).await);
        }

        let summary = pipeline_summary(&graph);
        tracing::info!(
            pipeline = %pipeline_name,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            artifacts = graph.artifacts.len(),
            status = %summary.overall_status,
            "lineage graph built"
        );

        let data = match view {
            GraphView::Pipeline => None,
            GraphView::Data | GraphView::Both => Some(to_data_view(&graph)),
        };
        let pipeline = match view {
            GraphView::Data => None,
            GraphView::Pipeline | GraphView::Both => Some(graph),
        };

        LineageReport {
            pipeline,
            data,
            summary,
            warnings,
        }
    }
}
