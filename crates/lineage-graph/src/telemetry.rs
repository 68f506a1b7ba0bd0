//! Telemetry enrichment: attach status, timing, metrics, and the
//! execution-time IO view from the latest pipeline execution.

use async_trait::async_trait;
use chrono::DateTime;

use lineage_types::{
    EnrichmentWarning, ExecutionStep, JobDescription, JobHandle, RegistryInfo, Result, RunInfo,
};

use crate::builder::collect_artifacts;
use crate::graph::{ProcessGraph, ProcessNode};
use crate::options::EnrichOptions;

/// Source of execution telemetry. The engine never calls a cloud SDK itself;
/// callers supply an implementation (or a mock in tests).
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    /// Execution-step records of the most recent execution. An empty list is
    /// the expected answer for a pipeline that has never run.
    async fn latest_execution_steps(&self, pipeline_name: &str) -> Result<Vec<ExecutionStep>>;

    /// Authoritative input/output channel list and metrics of a finished job.
    async fn describe_job(&self, handle: &JobHandle) -> Result<JobDescription>;
}

/// Enrich the graph from the latest execution of `pipeline_name`.
///
/// Per-step job lookups are individually fault tolerant: one failed describe
/// leaves that node's definition-time IO in place and moves on. A top-level
/// failure leaves the graph exactly as built and reports a single warning.
/// Afterwards the artifact list is recomputed from the (possibly rewritten)
/// node IO so the artifact and data views stay consistent.
pub async fn enrich_with_latest_execution(
    graph: &mut ProcessGraph,
    provider: &dyn ExecutionProvider,
    pipeline_name: &str,
    opts: &EnrichOptions,
) -> Vec<EnrichmentWarning> {
    let mut warnings = Vec::new();

    let scope = format!("execution:{pipeline_name}");
    let steps = match opts
        .bounded(&scope, provider.latest_execution_steps(pipeline_name))
        .await
    {
        Ok(steps) => steps,
        Err(err) => {
            tracing::warn!(pipeline = %pipeline_name, error = %err, "execution list unavailable, leaving graph unenriched");
            warnings.push(EnrichmentWarning::new(scope, err.to_string()));
            return warnings;
        }
    };

    for step in &steps {
        let Some(node) = graph.node_mut(&step.step_name) else {
            continue;
        };

        let run = node.run.get_or_insert_with(RunInfo::default);
        run.status = step.step_status.clone();
        run.start_time = step.start_time.clone();
        run.end_time = step.end_time.clone();
        run.elapsed_sec = elapsed_seconds(step.start_time.as_deref(), step.end_time.as_deref());

        if let Some(arn) = step.metadata.model_package_arn() {
            node.registry = Some(RegistryInfo {
                model_package_arn: arn.to_string(),
            });
        }

        if let Some(handle) = step.metadata.job_handle() {
            let scope = format!("job:{}", handle.job_name());
            match opts.bounded(&scope, provider.describe_job(&handle)).await {
                Ok(job) => apply_job_description(node, &job),
                Err(err) => {
                    tracing::warn!(step = %step.step_name, error = %err, "job description unavailable");
                    warnings.push(EnrichmentWarning::new(scope, err.to_string()));
                }
            }
        }
    }

    graph.artifacts = collect_artifacts(&graph.nodes);
    warnings
}

/// Elapsed whole seconds, clamped at zero. A malformed timestamp pair skips
/// only this field, never the status fields already applied.
fn elapsed_seconds(start: Option<&str>, end: Option<&str>) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(start?).ok()?;
    let end = DateTime::parse_from_rfc3339(end?).ok()?;
    Some((end - start).num_seconds().max(0))
}

/// Overwrite the node's definition-time IO with the resolved execution-time
/// view. Empty channel lists keep the definition-time slots.
fn apply_job_description(node: &mut ProcessNode, job: &JobDescription) {
    let run = node.run.get_or_insert_with(RunInfo::default);
    run.job_arn = job.arn.clone();
    run.job_name = job.name.clone();
    run.metrics.extend(job.metrics.iter().map(|(k, v)| (k.clone(), *v)));

    if !job.inputs.is_empty() {
        node.inputs = job.inputs.clone();
    }
    if !job.outputs.is_empty() {
        node.outputs = job.outputs.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    use lineage_types::{IoSlot, LineageError, PipelineDefinition};
    use serde_json::json;

    use crate::builder::build_graph;

    fn base_graph() -> ProcessGraph {
        build_graph(&PipelineDefinition::from_value(&json!({
            "Steps": [
                {
                    "Name": "Preprocess",
                    "Type": "Processing",
                    "Arguments": {
                        "ProcessingInputs": [{"InputName": "raw", "S3Input": {"S3Uri": "s3://data/raw"}}],
                        "ProcessingOutputConfig": {
                            "Outputs": [{"OutputName": "train", "S3Output": {"S3Uri": "s3://data/train"}}]
                        }
                    }
                },
                {
                    "Name": "Train",
                    "Type": "Training",
                    "DependsOn": ["Preprocess"],
                    "Arguments": {
                        "TrainingJobDefinition": {
                            "InputDataConfig": [
                                {"ChannelName": "train", "DataSource": {"S3DataSource": {"S3Uri": "s3://data/train"}}}
                            ],
                            "OutputDataConfig": {"S3OutputPath": "s3://models/out"}
                        }
                    }
                }
            ]
        })))
    }

    fn execution_steps() -> Vec<ExecutionStep> {
        serde_json::from_value(json!([
            {
                "StepName": "Preprocess",
                "StepStatus": "Succeeded",
                "StartTime": "2024-05-01T10:00:00Z",
                "EndTime": "2024-05-01T10:05:30Z",
                "Metadata": {"ProcessingJob": {"Arn": "arn:aws:sagemaker:x:1:processing-job/prep-1"}}
            },
            {
                "StepName": "Train",
                "StepStatus": "Succeeded",
                "StartTime": "2024-05-01T10:06:00Z",
                "EndTime": "2024-05-01T10:30:00Z",
                "Metadata": {"TrainingJob": {"Arn": "arn:aws:sagemaker:x:1:training-job/train-1"}}
            }
        ]))
        .unwrap()
    }

    struct MockProvider {
        steps: Vec<ExecutionStep>,
        jobs: HashMap<String, JobDescription>,
        failing_jobs: Vec<String>,
        fail_listing: bool,
    }

    impl MockProvider {
        fn new(steps: Vec<ExecutionStep>) -> Self {
            Self {
                steps,
                jobs: HashMap::new(),
                failing_jobs: Vec::new(),
                fail_listing: false,
            }
        }
    }

    #[async_trait]
    impl ExecutionProvider for MockProvider {
        async fn latest_execution_steps(&self, _pipeline_name: &str) -> Result<Vec<ExecutionStep>> {
            if self.fail_listing {
                return Err(LineageError::Lookup {
                    scope: "execution".into(),
                    message: "listing unavailable".into(),
                });
            }
            Ok(self.steps.clone())
        }

        async fn describe_job(&self, handle: &JobHandle) -> Result<JobDescription> {
            let name = handle.job_name();
            if self.failing_jobs.iter().any(|j| j == name) {
                return Err(LineageError::Lookup {
                    scope: format!("job:{name}"),
                    message: "describe failed".into(),
                });
            }
            self.jobs.get(name).cloned().ok_or_else(|| LineageError::Lookup {
                scope: format!("job:{name}"),
                message: "not found".into(),
            })
        }
    }

    #[tokio::test]
    async fn status_and_elapsed_are_applied_per_step() {
        let mut graph = base_graph();
        let mut provider = MockProvider::new(execution_steps());
        // No job descriptions registered; job lookups fail but status stays.
        provider.failing_jobs = vec!["prep-1".into(), "train-1".into()];

        let warnings =
            enrich_with_latest_execution(&mut graph, &provider, "demo", &EnrichOptions::default())
                .await;

        let run = graph.node("Preprocess").unwrap().run.as_ref().unwrap();
        assert_eq!(run.status.as_deref(), Some("Succeeded"));
        assert_eq!(run.elapsed_sec, Some(330));
        assert_eq!(warnings.len(), 2);
    }

    #[tokio::test]
    async fn one_failed_job_lookup_does_not_block_the_next_step() {
        let mut graph = base_graph();
        let mut provider = MockProvider::new(execution_steps());
        provider.failing_jobs = vec!["prep-1".into()];
        provider.jobs.insert(
            "train-1".into(),
            JobDescription {
                arn: Some("arn:train-1".into()),
                name: Some("train-1".into()),
                inputs: vec![IoSlot::uri("train", "s3://resolved/train")],
                outputs: vec![IoSlot::uri("model_artifacts", "s3://resolved/model")],
                metrics: BTreeMap::from([("validation:accuracy".to_string(), 0.93)]),
            },
        );

        let warnings =
            enrich_with_latest_execution(&mut graph, &provider, "demo", &EnrichOptions::default())
                .await;
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].scope.contains("prep-1"));

        // Step A keeps its status even though its job describe failed.
        assert!(graph.node("Preprocess").unwrap().run.is_some());

        // Step B got the authoritative IO and metrics.
        let train = graph.node("Train").unwrap();
        assert_eq!(train.inputs, vec![IoSlot::uri("train", "s3://resolved/train")]);
        let run = train.run.as_ref().unwrap();
        assert_eq!(run.job_name.as_deref(), Some("train-1"));
        assert_eq!(run.metrics.get("validation:accuracy"), Some(&0.93));
    }

    #[tokio::test]
    async fn artifacts_are_recomputed_from_enriched_io() {
        let mut graph = base_graph();
        let mut provider = MockProvider::new(execution_steps());
        provider.failing_jobs = vec!["prep-1".into()];
        provider.jobs.insert(
            "train-1".into(),
            JobDescription {
                inputs: vec![IoSlot::uri("train", "s3://resolved/train")],
                outputs: vec![IoSlot::uri("model_artifacts", "s3://resolved/model")],
                ..Default::default()
            },
        );

        enrich_with_latest_execution(&mut graph, &provider, "demo", &EnrichOptions::default())
            .await;

        let uris: Vec<&str> = graph.artifacts.iter().map(|a| a.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec!["s3://data/raw", "s3://data/train", "s3://resolved/train", "s3://resolved/model"]
        );
        // Ids reassigned in first-seen order over the new scan.
        assert_eq!(graph.artifacts[3].id, 3);
    }

    #[tokio::test]
    async fn top_level_failure_leaves_graph_as_built() {
        let mut graph = base_graph();
        let before = graph.clone();
        let mut provider = MockProvider::new(Vec::new());
        provider.fail_listing = true;

        let warnings =
            enrich_with_latest_execution(&mut graph, &provider, "demo", &EnrichOptions::default())
                .await;
        assert_eq!(graph, before);
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn zero_executions_is_not_an_error() {
        let mut graph = base_graph();
        let provider = MockProvider::new(Vec::new());
        let warnings =
            enrich_with_latest_execution(&mut graph, &provider, "demo", &EnrichOptions::default())
                .await;
        assert!(warnings.is_empty());
        assert!(graph.node("Preprocess").unwrap().run.is_none());
    }

    #[tokio::test]
    async fn model_package_arn_populates_registry() {
        let mut graph = build_graph(&PipelineDefinition::from_value(&json!({
            "Steps": [{"Name": "Register", "Type": "RegisterModel", "Arguments": {}}]
        })));
        let steps: Vec<ExecutionStep> = serde_json::from_value(json!([
            {
                "StepName": "Register",
                "StepStatus": "Succeeded",
                "Metadata": {"RegisterModel": {"Arn": "arn:model-pkg/42"}}
            }
        ]))
        .unwrap();
        let provider = MockProvider::new(steps);

        enrich_with_latest_execution(&mut graph, &provider, "demo", &EnrichOptions::default())
            .await;

        let registry = graph.node("Register").unwrap().registry.as_ref().unwrap();
        assert_eq!(registry.model_package_arn, "arn:model-pkg/42");
    }

    #[test]
    fn elapsed_is_clamped_and_tolerates_garbage() {
        assert_eq!(
            elapsed_seconds(Some("2024-05-01T10:00:00Z"), Some("2024-05-01T09:59:00Z")),
            Some(0)
        );
        assert_eq!(elapsed_seconds(Some("not-a-time"), Some("2024-05-01T10:00:00Z")), None);
        assert_eq!(elapsed_seconds(None, Some("2024-05-01T10:00:00Z")), None);
    }
}
