//! Evaluation-report probing: pull numeric metrics out of the report object
//! a step wrote next to its `report` output.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use lineage_types::{split_storage_uri, EnrichmentWarning, RunInfo};

use crate::graph::ProcessGraph;
use crate::options::EnrichOptions;
use crate::storage::StorageProvider;

/// Well-known file names probed under a report output prefix, in order.
const REPORT_CANDIDATES: [&str; 3] = ["report.json", "evaluation.json", "metrics.json"];

/// For every node with an output slot named `report`, probe the candidate
/// objects under that output's URI and merge any numeric fields found into
/// the node's run metrics under an `eval.` prefix. The first candidate that
/// fetches and parses wins; misses are quiet since probing for an absent
/// report is the normal case.
pub async fn enrich_report_metrics(
    graph: &mut ProcessGraph,
    provider: Arc<dyn StorageProvider>,
    opts: &EnrichOptions,
) -> Vec<EnrichmentWarning> {
    let mut warnings = Vec::new();

    for node in &mut graph.nodes {
        let Some(uri) = node
            .outputs
            .iter()
            .find(|slot| slot.name == "report")
            .and_then(|slot| slot.locator.as_uri().map(str::to_string))
        else {
            continue;
        };
        let Some((bucket, prefix)) = split_storage_uri(&uri) else {
            continue;
        };

        // An output that already points at a JSON object is probed as-is,
        // ahead of the well-known names under the prefix.
        let mut keys: Vec<String> = Vec::with_capacity(1 + REPORT_CANDIDATES.len());
        if prefix.ends_with(".json") {
            keys.push(prefix.clone());
        }
        keys.extend(REPORT_CANDIDATES.iter().map(|c| join_key(&prefix, c)));

        for key in keys {
            if opts.deadline_exceeded() {
                warnings.push(EnrichmentWarning::new(
                    format!("report:{}", node.id),
                    "deadline exceeded before probe",
                ));
                break;
            }
            let scope = format!("report:{bucket}/{key}");
            match opts.bounded(&scope, provider.object_json(&bucket, &key)).await {
                Ok(doc) => {
                    let mut metrics = BTreeMap::new();
                    flatten_numeric("eval", &doc, &mut metrics);
                    let run = node.run.get_or_insert_with(RunInfo::default);
                    run.metrics.extend(metrics);
                    run.report_object = Some(format!("s3://{bucket}/{key}"));
                    break;
                }
                Err(err) => {
                    tracing::debug!(node = %node.id, object = %key, error = %err, "report probe miss");
                }
            }
        }
    }
    warnings
}

fn join_key(prefix: &str, candidate: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        candidate.to_string()
    } else {
        format!("{prefix}/{candidate}")
    }
}

/// Collect numeric leaves of a JSON document under dotted keys.
fn flatten_numeric(prefix: &str, value: &Value, out: &mut BTreeMap<String, f64>) {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                out.insert(prefix.to_string(), f);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                flatten_numeric(&format!("{prefix}.{key}"), child, out);
            }
        }
        _ => {}
    }
}
