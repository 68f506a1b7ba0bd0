//! Roll-up of per-node run telemetry into a single pipeline summary.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::graph::ProcessGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub overall_status: String,
    pub node_status: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<i64>,
}

/// Summarize run status across the graph.
///
/// Any failed node makes the pipeline `Failed`; a still-running node makes it
/// `Executing`; otherwise `Succeeded` when at least one node succeeded and
/// `Unknown` for anything else. Elapsed time spans the earliest
/// start to the latest end across all nodes, not the sum of step durations.
pub fn pipeline_summary(graph: &ProcessGraph) -> PipelineSummary {
    let mut node_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut starts: Vec<DateTime<FixedOffset>> = Vec::new();
    let mut ends: Vec<DateTime<FixedOffset>> = Vec::new();

    for node in &graph.nodes {
        let status = node
            .run
            .as_ref()
            .and_then(|run| run.status.as_deref())
            .unwrap_or("Unknown");
        *node_status.entry(status.to_string()).or_default() += 1;

        if let Some(run) = &node.run {
            if let Some(t) = run.start_time.as_deref().and_then(parse_time) {
                starts.push(t);
            }
            if let Some(t) = run.end_time.as_deref().and_then(parse_time) {
                ends.push(t);
            }
        }
    }

    let overall_status = if node_status.contains_key("Failed") {
        "Failed"
    } else if node_status.contains_key("Executing") {
        "Executing"
    } else if node_status.contains_key("Succeeded") {
        "Succeeded"
    } else {
        "Unknown"
    };

    let elapsed_sec = match (starts.iter().min(), ends.iter().max()) {
        (Some(start), Some(end)) => Some((*end - *start).num_seconds().max(0)),
        _ => None,
    };

    PipelineSummary {
        overall_status: overall_status.to_string(),
        node_status,
        elapsed_sec,
    }
}

fn parse_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}
