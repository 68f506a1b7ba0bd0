//! File-backed provider implementations so reports can be built from
//! captured telemetry instead of live cloud lookups.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use lineage_graph::{ExecutionProvider, StorageProvider};
use lineage_types::{
    ExecutionStep, JobDescription, JobHandle, LineageError, PublicAccessFlags, Result,
};

/// Execution telemetry captured to JSON: the step list of the latest
/// execution plus job descriptions keyed by job name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExecutionFixture {
    pub steps: Vec<ExecutionStep>,
    pub jobs: HashMap<String, JobDescription>,
}

impl ExecutionFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl ExecutionProvider for ExecutionFixture {
    async fn latest_execution_steps(&self, _pipeline_name: &str) -> Result<Vec<ExecutionStep>> {
        Ok(self.steps.clone())
    }

    async fn describe_job(&self, handle: &JobHandle) -> Result<JobDescription> {
        self.jobs
            .get(handle.job_name())
            .cloned()
            .ok_or_else(|| LineageError::Lookup {
                scope: format!("job:{}", handle.job_name()),
                message: "not present in fixture".to_string(),
            })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketFixture {
    pub region: Option<String>,
    pub encryption: Option<String>,
    pub versioning: Option<String>,
    pub public_access: Option<PublicAccessFlags>,
    pub tags: BTreeMap<String, String>,
    pub objects: HashMap<String, Value>,
}

/// Bucket metadata captured to JSON, keyed by bucket name. Any attribute
/// missing from the fixture behaves like a failed lookup.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageFixture {
    pub buckets: HashMap<String, BucketFixture>,
}

impl StorageFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn bucket(&self, bucket: &str) -> Result<&BucketFixture> {
        self.buckets.get(bucket).ok_or_else(|| LineageError::Lookup {
            scope: format!("storage:{bucket}"),
            message: "bucket not present in fixture".to_string(),
        })
    }

    fn attr<T: Clone>(&self, bucket: &str, attr: &str, value: Option<&T>) -> Result<T> {
        value.cloned().ok_or_else(|| LineageError::Lookup {
            scope: format!("storage:{bucket}:{attr}"),
            message: "attribute not present in fixture".to_string(),
        })
    }
}

#[async_trait]
impl StorageProvider for StorageFixture {
    async fn bucket_region(&self, bucket: &str) -> Result<String> {
        let fixture = self.bucket(bucket)?;
        self.attr(bucket, "region", fixture.region.as_ref())
    }

    async fn bucket_encryption(&self, bucket: &str) -> Result<String> {
        let fixture = self.bucket(bucket)?;
        self.attr(bucket, "encryption", fixture.encryption.as_ref())
    }

    async fn bucket_versioning(&self, bucket: &str) -> Result<String> {
        let fixture = self.bucket(bucket)?;
        self.attr(bucket, "versioning", fixture.versioning.as_ref())
    }

    async fn public_access_flags(&self, bucket: &str) -> Result<PublicAccessFlags> {
        let fixture = self.bucket(bucket)?;
        self.attr(bucket, "publicAccess", fixture.public_access.as_ref())
    }

    async fn bucket_tags(&self, bucket: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.bucket(bucket)?.tags.clone())
    }

    async fn object_json(&self, bucket: &str, key: &str) -> Result<Value> {
        self.bucket(bucket)?
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| LineageError::Lookup {
                scope: format!("storage:{bucket}/{key}"),
                message: "object not present in fixture".to_string(),
            })
    }
}
