//! Shared types, errors, and locator helpers for the lineage engine.
//!
//! This crate provides the foundational types used across all other lineage crates:
//! - `LineageError` — unified error taxonomy
//! - `Locator` — tagged storage-URI / step-reference union
//! - raw pipeline-definition and execution-record shapes
//! - `Artifact` and its storage security metadata

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unified error type for all lineage subsystems.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("Malformed pipeline definition: {0}")]
    Definition(String),

    #[error("Lookup failed for {scope}: {message}")]
    Lookup { scope: String, message: String },

    #[error("Lookup for {scope} timed out after {timeout_ms}ms")]
    LookupTimeout { scope: String, timeout_ms: u64 },

    #[error("SQL parse error: {0}")]
    SqlParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A convenience alias for `Result<T, LineageError>`.
pub type Result<T> = std::result::Result<T, LineageError>;

// ---------------------------------------------------------------------------
// URI and step-reference helpers
// ---------------------------------------------------------------------------

fn ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Steps\.([A-Za-z0-9\-_]+)").unwrap())
}

fn storage_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^s3://([^/]+)/?(.*)$").unwrap())
}

/// Canonical artifact key: lowercase, trailing slashes stripped.
pub fn normalize_uri(uri: &str) -> String {
    uri.trim_end_matches('/').to_ascii_lowercase()
}

/// Data-node identifier for a storage URI.
pub fn data_id(uri: &str) -> String {
    format!("data:{}", normalize_uri(uri))
}

/// Process-node identifier for a step id.
pub fn process_id(step_id: &str) -> String {
    format!("process:{step_id}")
}

/// Split an `s3://bucket/key` URI into `(bucket, key)`.
pub fn split_storage_uri(uri: &str) -> Option<(String, String)> {
    let caps = storage_uri_regex().captures(uri)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Extract the source step id from a symbolic reference payload.
///
/// Accepts either a raw reference string or an object carrying one under
/// `Get` / `Std:Ref`, e.g. `{"Get": "Steps.Preprocess.ProcessingOutputConfig..."}`.
pub fn extract_ref_step(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get("Get")
            .or_else(|| map.get("Std:Ref"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    ref_regex()
        .captures(text)
        .map(|caps| caps[1].to_string())
}

// ---------------------------------------------------------------------------
// Locator — storage URI or symbolic step reference
// ---------------------------------------------------------------------------

/// Where a step input/output lives: a concrete storage URI, or a symbolic
/// reference to another step's output. Every consumer switches on the tag;
/// a reference never coerces into a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    #[serde(rename = "uri")]
    Uri(String),
    #[serde(rename = "ref")]
    StepRef(String),
}

impl Locator {
    /// Interpret a raw argument value: strings are URIs, objects are probed
    /// for a `Steps.<id>` reference. Anything else resolves to nothing.
    pub fn from_argument(value: &Value) -> Option<Locator> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Locator::Uri(s.clone())),
            Value::Object(_) => extract_ref_step(value).map(Locator::StepRef),
            _ => None,
        }
    }

    pub fn as_uri(&self) -> Option<&str> {
        match self {
            Locator::Uri(u) => Some(u),
            Locator::StepRef(_) => None,
        }
    }

    pub fn as_step_ref(&self) -> Option<&str> {
        match self {
            Locator::StepRef(s) => Some(s),
            Locator::Uri(_) => None,
        }
    }
}

/// One normalized step input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoSlot {
    pub name: String,
    #[serde(flatten)]
    pub locator: Locator,
}

impl IoSlot {
    pub fn uri(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: Locator::Uri(uri.into()),
        }
    }

    pub fn step_ref(name: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: Locator::StepRef(step.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw pipeline definition
// ---------------------------------------------------------------------------

/// `DependsOn` appears both as a single step name and as a list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DependsOn {
    One(String),
    Many(Vec<String>),
}

impl Default for DependsOn {
    fn default() -> Self {
        DependsOn::Many(Vec::new())
    }
}

impl DependsOn {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            DependsOn::One(s) => vec![s.clone()],
            DependsOn::Many(v) => v.clone(),
        }
    }
}

/// One step as found in a raw pipeline definition. `arguments` keeps its
/// type-specific shape; the normalizer is the only consumer that digs into it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "Type", default)]
    pub step_type: String,
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub arguments: Value,
}

/// A pipeline definition reduced to its step list.
#[derive(Debug, Clone, Default)]
pub struct PipelineDefinition {
    pub steps: Vec<StepDef>,
}

impl PipelineDefinition {
    /// Extract the step list from a raw definition document. The list may live
    /// at `Steps`, `PipelineDefinition.Steps`, or `Definition.Steps`; a missing
    /// list yields an empty definition, and individual steps that fail to
    /// deserialize are skipped.
    pub fn from_value(doc: &Value) -> PipelineDefinition {
        let raw_steps = doc
            .get("Steps")
            .or_else(|| doc.get("PipelineDefinition").and_then(|d| d.get("Steps")))
            .or_else(|| doc.get("Definition").and_then(|d| d.get("Steps")))
            .and_then(Value::as_array);

        let mut steps = Vec::new();
        for raw in raw_steps.into_iter().flatten() {
            match serde_json::from_value::<StepDef>(raw.clone()) {
                Ok(step) => steps.push(step),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping undeserializable step");
                }
            }
        }
        PipelineDefinition { steps }
    }
}

// ---------------------------------------------------------------------------
// Artifacts and storage security metadata
// ---------------------------------------------------------------------------

/// Bucket-level security metadata. Each attribute is independently queryable
/// and falls back to `"Unknown"` when its lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMeta {
    pub region: String,
    pub encryption: String,
    pub versioning: String,
    pub public_access: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

impl StorageMeta {
    pub fn unknown() -> Self {
        Self {
            region: "Unknown".into(),
            encryption: "Unknown".into(),
            versioning: "Unknown".into(),
            public_access: "Unknown".into(),
            tags: None,
        }
    }
}

/// Public-access block flags for a bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PublicAccessFlags {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessFlags {
    /// `"Blocked"` iff every block flag is set, else `"Partial"`.
    pub fn classify(&self) -> &'static str {
        if self.block_public_acls
            && self.ignore_public_acls
            && self.block_public_policy
            && self.restrict_public_buckets
        {
            "Blocked"
        } else {
            "Partial"
        }
    }
}

/// A deduplicated storage location referenced by at least one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: usize,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageMeta>,
}

impl Artifact {
    pub fn new(id: usize, uri: &str) -> Self {
        let (bucket, key) = match split_storage_uri(uri) {
            Some((b, k)) => (Some(b), Some(k)),
            None => (None, None),
        };
        Self {
            id,
            uri: uri.to_string(),
            bucket,
            key,
            storage: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution telemetry records
// ---------------------------------------------------------------------------

/// Per-step run telemetry attached during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_object: Option<String>,
}

/// Model-registry linkage for a step that registered a model package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryInfo {
    pub model_package_arn: String,
}

/// One execution-step record from the latest pipeline execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionStep {
    pub step_name: String,
    #[serde(default)]
    pub step_status: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub metadata: StepMetadata,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StepMetadata {
    pub processing_job: Option<JobRef>,
    pub training_job: Option<JobRef>,
    pub model: Option<ModelRef>,
    pub register_model: Option<JobRef>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobRef {
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModelRef {
    pub model_package_arn: Option<String>,
}

/// The underlying job behind an execution step, named by the trailing segment
/// of its ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobHandle {
    Processing(String),
    Training(String),
}

impl JobHandle {
    pub fn job_name(&self) -> &str {
        match self {
            JobHandle::Processing(n) | JobHandle::Training(n) => n,
        }
    }
}

fn arn_job_name(arn: &str) -> Option<String> {
    arn.rsplit('/').next().map(str::to_string).filter(|s| !s.is_empty())
}

impl StepMetadata {
    /// Resolve the job handle exposed by this step's metadata, if any.
    pub fn job_handle(&self) -> Option<JobHandle> {
        if let Some(arn) = self.processing_job.as_ref().and_then(|j| j.arn.as_deref()) {
            return arn_job_name(arn).map(JobHandle::Processing);
        }
        if let Some(arn) = self.training_job.as_ref().and_then(|j| j.arn.as_deref()) {
            return arn_job_name(arn).map(JobHandle::Training);
        }
        None
    }

    /// Model-package ARN from either the model or register-model metadata.
    pub fn model_package_arn(&self) -> Option<&str> {
        self.model
            .as_ref()
            .and_then(|m| m.model_package_arn.as_deref())
            .or_else(|| self.register_model.as_ref().and_then(|r| r.arn.as_deref()))
    }
}

/// The authoritative execution-time view of one job's channels and metrics.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDescription {
    pub arn: Option<String>,
    pub name: Option<String>,
    pub inputs: Vec<IoSlot>,
    pub outputs: Vec<IoSlot>,
    pub metrics: BTreeMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Enrichment warnings
// ---------------------------------------------------------------------------

/// A tolerated enrichment failure, accumulated alongside the graph rather
/// than only logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentWarning {
    pub scope: String,
    pub detail: String,
}

impl EnrichmentWarning {
    pub fn new(scope: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            detail: detail.into(),
        }
    }
}
