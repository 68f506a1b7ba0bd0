//! Storage-security enrichment: bucket-level metadata attached to every
//! artifact that resolves to a bucket.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use lineage_types::{EnrichmentWarning, PublicAccessFlags, Result, StorageMeta};

use crate::graph::ProcessGraph;
use crate::options::EnrichOptions;

/// Source of bucket and object metadata. Implementations back onto the
/// object store's control-plane API, or onto fixture files in tests and the
/// command-line tool.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn bucket_region(&self, bucket: &str) -> Result<String>;
    async fn bucket_encryption(&self, bucket: &str) -> Result<String>;
    async fn bucket_versioning(&self, bucket: &str) -> Result<String>;
    async fn public_access_flags(&self, bucket: &str) -> Result<PublicAccessFlags>;
    async fn bucket_tags(&self, bucket: &str) -> Result<BTreeMap<String, String>>;

    /// Fetch and parse one JSON object. Used by the report probe, not by the
    /// bucket-metadata pass.
    async fn object_json(&self, bucket: &str, key: &str) -> Result<serde_json::Value>;
}

/// Attach [`StorageMeta`] to every artifact whose URI names a bucket.
///
/// Buckets are queried once each, concurrently. Within one bucket the five
/// attribute lookups are independent: a failed lookup leaves `"Unknown"` in
/// that attribute (or no tags) and records a warning, without disturbing the
/// other four. Once the overall deadline passes, remaining buckets are
/// skipped with a warning and already-fetched metadata is kept.
pub async fn enrich_storage_meta(
    graph: &mut ProcessGraph,
    provider: Arc<dyn StorageProvider>,
    opts: &EnrichOptions,
) -> Vec<EnrichmentWarning> {
    let buckets: BTreeSet<String> = graph
        .artifacts
        .iter()
        .filter_map(|a| a.bucket.clone())
        .collect();

    let mut warnings = Vec::new();
    let mut tasks = JoinSet::new();
    for bucket in buckets {
        if opts.deadline_exceeded() {
            tracing::warn!(bucket = %bucket, "storage deadline exceeded, skipping bucket");
            warnings.push(EnrichmentWarning::new(
                format!("storage:{bucket}"),
                "deadline exceeded before lookup",
            ));
            continue;
        }
        let provider = Arc::clone(&provider);
        let opts = opts.clone();
        tasks.spawn(async move {
            let (meta, warnings) = bucket_meta(provider.as_ref(), &bucket, &opts).await;
            (bucket, meta, warnings)
        });
    }

    let mut by_bucket: HashMap<String, StorageMeta> = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((bucket, meta, bucket_warnings)) => {
                warnings.extend(bucket_warnings);
                by_bucket.insert(bucket, meta);
            }
            Err(err) => {
                tracing::warn!(error = %err, "storage lookup task failed");
                warnings.push(EnrichmentWarning::new("storage", err.to_string()));
            }
        }
    }

    for artifact in &mut graph.artifacts {
        if let Some(meta) = artifact.bucket.as_ref().and_then(|b| by_bucket.get(b)) {
            artifact.storage = Some(meta.clone());
        }
    }
    warnings
}

/// Resolve the five security attributes of one bucket, degrading each to
/// `"Unknown"` independently.
async fn bucket_meta(
    provider: &dyn StorageProvider,
    bucket: &str,
    opts: &EnrichOptions,
) -> (StorageMeta, Vec<EnrichmentWarning>) {
    let mut meta = StorageMeta::unknown();
    let mut warnings = Vec::new();
    let mut note = |attr: &str, err: lineage_types::LineageError| {
        tracing::warn!(bucket = %bucket, attribute = %attr, error = %err, "bucket lookup failed");
        warnings.push(EnrichmentWarning::new(
            format!("storage:{bucket}:{attr}"),
            err.to_string(),
        ));
    };

    match opts.bounded("region", provider.bucket_region(bucket)).await {
        Ok(region) => meta.region = region,
        Err(err) => note("region", err),
    }
    match opts
        .bounded("encryption", provider.bucket_encryption(bucket))
        .await
    {
        Ok(encryption) => meta.encryption = encryption,
        Err(err) => note("encryption", err),
    }
    match opts
        .bounded("versioning", provider.bucket_versioning(bucket))
        .await
    {
        Ok(versioning) => meta.versioning = versioning,
        Err(err) => note("versioning", err),
    }
    match opts
        .bounded("publicAccess", provider.public_access_flags(bucket))
        .await
    {
        Ok(flags) => meta.public_access = flags.classify().to_string(),
        Err(err) => note("publicAccess", err),
    }
    match opts.bounded("tags", provider.bucket_tags(bucket)).await {
        Ok(tags) if !tags.is_empty() => meta.tags = Some(tags),
        Ok(_) => {}
        Err(err) => note("tags", err),
    }

    (meta, warnings)
}
