use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::filter::FilterSpec;
use crate::record::{records_from_str, Record};

/// A provider of records for one dashboard.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the records for `spec`. Sources may use the spec to narrow
    /// their query; the pipeline filters again either way.
    async fn fetch(&self, spec: &FilterSpec) -> Result<Vec<Record>>;
}

#[async_trait]
impl RecordSource for Arc<dyn RecordSource> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, spec: &FilterSpec) -> Result<Vec<Record>> {
        (**self).fetch(spec).await
    }
}

/// Reads a JSON payload file: an array of records, or an object wrapping
/// one under `issues`, `data` or `records`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _spec: &FilterSpec) -> Result<Vec<Record>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Fetch {
                source_name: self.name.clone(),
                message: e.to_string(),
            })?;
        let records = records_from_str(&text)?;
        log::info!("Loaded {} records from {}", records.len(), self.name);
        Ok(records)
    }
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    records: Vec<Record>,
}

impl StaticSource {
    pub fn new(name: &str, records: Vec<Record>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _spec: &FilterSpec) -> Result<Vec<Record>> {
        Ok(self.records.clone())
    }
}

/// Timeout applied to every fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_secs(30)
    }
}

impl FetchPolicy {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(secs),
        }
    }

    pub async fn fetch<S>(&self, source: &S, spec: &FilterSpec) -> Result<Vec<Record>>
    where
        S: RecordSource + ?Sized,
    {
        match tokio::time::timeout(self.timeout, source.fetch(spec)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout {
                source_name: source.name().to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

/// Metrics produced by one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed<T> {
    pub generation: u64,
    /// Records fetched, before filtering.
    pub fetched: usize,
    pub metrics: T,
}

/// One dashboard bound to its record source.
pub struct Dashboard<S> {
    source: S,
    policy: FetchPolicy,
    latest: AtomicU64,
}

impl<S: RecordSource> Dashboard<S> {
    pub fn new(source: S, policy: FetchPolicy) -> Self {
        Self {
            source,
            policy,
            latest: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Generation of the most recently started refresh (0 before any).
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Fetch records for `spec` and run `compute` over them.
    ///
    /// `compute` only runs on a complete, successful fetch. Returns
    /// [`Error::Superseded`] when another refresh started meanwhile.
    pub async fn refresh<T, F>(&self, spec: &FilterSpec, compute: F) -> Result<Refreshed<T>>
    where
        F: FnOnce(&[Record], &FilterSpec) -> T,
    {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Refresh {} of {} started", generation, self.source.name());

        let records = self.policy.fetch(&self.source, spec).await?;
        self.check_current(generation)?;

        let metrics = compute(&records, spec);
        self.check_current(generation)?;

        Ok(Refreshed {
            generation,
            fetched: records.len(),
            metrics,
        })
    }

    fn check_current(&self, generation: u64) -> Result<()> {
        let latest = self.latest_generation();
        if latest != generation {
            log::warn!(
                "Discarding refresh {} of {}: refresh {} is newer",
                generation,
                self.source.name(),
                latest
            );
            return Err(Error::Superseded { generation, latest });
        }
        Ok(())
    }
}
