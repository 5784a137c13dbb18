//! Local/remote synchronization.
//!
//! [`SyncCoordinator`] owns the local cache and the optional remote store.
//! Every operation applies its local effect first. Remote effects are
//! attempted afterwards and their failures are returned as a
//! [`RemoteOutcome`] next to the local result; they never undo the local
//! effect.

use crate::analysis::{aggregate, validate};
use crate::error::{CacheError, RemoteError, SyncError};
use crate::models::{Dataset, DatasetEntry, DatasetIndex, Row, Tier};
use crate::storage::local::LocalCache;
use crate::storage::remote::{RemoteStore, RepoAccess};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use tracing::{debug, info, warn};

/// What happened on the remote tier during one operation.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// No credential configured.
    Disabled,
    /// The dataset is local-only, nothing to do remotely.
    LocalOnly,
    Uploaded { locator: String },
    Refreshed,
    Deleted,
    Reconciled,
    Failed(RemoteError),
}

impl RemoteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RemoteOutcome::Failed(_))
    }
}

impl fmt::Display for RemoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteOutcome::Disabled => write!(f, "remote storage not configured"),
            RemoteOutcome::LocalOnly => write!(f, "local only"),
            RemoteOutcome::Uploaded { locator } => write!(f, "uploaded to {}", locator),
            RemoteOutcome::Refreshed => write!(f, "refreshed from remote"),
            RemoteOutcome::Deleted => write!(f, "deleted from remote"),
            RemoteOutcome::Reconciled => write!(f, "reconciled with remote"),
            RemoteOutcome::Failed(e) => write!(f, "remote failed: {}", e),
        }
    }
}

/// Result of [`SyncCoordinator::save_dataset`].
#[derive(Debug)]
pub struct SaveOutcome {
    pub entry: DatasetEntry,
    pub remote: RemoteOutcome,
}

impl SaveOutcome {
    pub fn summary(&self) -> String {
        match &self.remote {
            RemoteOutcome::Uploaded { locator } => format!(
                "Saved {} ({} records) locally and to remote: {}",
                self.entry.name, self.entry.record_count, locator
            ),
            RemoteOutcome::Failed(e) => format!(
                "Saved {} ({} records) locally. Remote upload failed ({}); your data is safe in the local cache.",
                self.entry.name, self.entry.record_count, e
            ),
            _ => format!(
                "Saved {} ({} records) to the local cache.",
                self.entry.name, self.entry.record_count
            ),
        }
    }
}

/// Result of [`SyncCoordinator::load_dataset`].
#[derive(Debug)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub remote: RemoteOutcome,
}

impl LoadOutcome {
    pub fn summary(&self) -> String {
        match &self.remote {
            RemoteOutcome::Refreshed => format!(
                "Loaded {} ({} records), synchronized with remote.",
                self.dataset.name,
                self.dataset.record_count()
            ),
            RemoteOutcome::Failed(e) => format!(
                "Loaded {} ({} records) from the local cache; remote refresh failed ({}), data may be stale.",
                self.dataset.name,
                self.dataset.record_count(),
                e
            ),
            _ => format!(
                "Loaded {} ({} records).",
                self.dataset.name,
                self.dataset.record_count()
            ),
        }
    }
}

/// Result of [`SyncCoordinator::delete_dataset`].
#[derive(Debug)]
pub struct DeleteOutcome {
    /// Whether a local entry existed.
    pub removed: bool,
    pub remote: RemoteOutcome,
}

impl DeleteOutcome {
    pub fn summary(&self, name: &str) -> String {
        if !self.removed {
            return format!("{} is not in the local cache; nothing to delete.", name);
        }
        match &self.remote {
            RemoteOutcome::Failed(e) => format!(
                "Deleted {} locally. Remote deletion failed ({}); the remote copy may reappear on the next sync.",
                name, e
            ),
            RemoteOutcome::Deleted => format!("Deleted {} locally and from remote.", name),
            _ => format!("Deleted {}.", name),
        }
    }
}

/// Result of [`SyncCoordinator::reconcile`].
#[derive(Debug)]
pub struct ReconcileReport {
    pub remote: RemoteOutcome,
    /// Number of dataset blobs found remotely.
    pub remote_count: usize,
    /// Names pulled into the local cache.
    pub downloaded: Vec<String>,
    /// Remote-only datasets that could not be pulled, with the reason.
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    fn with_outcome(remote: RemoteOutcome) -> Self {
        Self {
            remote,
            remote_count: 0,
            downloaded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Local index plus the reconciliation that preceded it.
#[derive(Debug)]
pub struct Listing {
    pub index: DatasetIndex,
    pub reconcile: ReconcileReport,
}

/// Result of [`SyncCoordinator::clear_all`].
#[derive(Debug, Default)]
pub struct ClearOutcome {
    pub removed: usize,
    pub remote_deleted: usize,
    pub remote_failures: Vec<(String, RemoteError)>,
}

/// Orchestrates the two storage tiers.
pub struct SyncCoordinator {
    cache: LocalCache,
    remote: Option<Box<dyn RemoteStore>>,
    folder: String,
}

impl SyncCoordinator {
    pub fn new(cache: LocalCache, remote: Option<Box<dyn RemoteStore>>, folder: &str) -> Self {
        Self {
            cache,
            remote,
            folder: folder.trim_matches('/').to_string(),
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    fn remote_path(&self, name: &str) -> String {
        if self.folder.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.folder, name)
        }
    }

    /// Verify remote access. `None` when no remote is configured.
    pub async fn check_access(&self) -> Option<Result<RepoAccess, RemoteError>> {
        match &self.remote {
            Some(remote) => Some(remote.check_access().await),
            None => None,
        }
    }

    /// Validate, aggregate and save freshly ingested rows.
    pub async fn ingest(&self, source_name: &str, rows: Vec<Row>) -> Result<SaveOutcome, SyncError> {
        let count = validate(&rows)?;
        let aggregation = aggregate(&rows);
        let name = dataset_file_name(source_name, Utc::now());
        info!(
            "Aggregated {} records into {} clusters",
            count,
            aggregation.clusters.len()
        );

        let dataset = Dataset::new(name, rows, aggregation);
        let message = format!("Upload data: {} ({} records)", source_name, count);
        Ok(self.save_dataset(dataset, &message).await?)
    }

    /// Save locally, then upload when a remote is configured.
    pub async fn save_dataset(
        &self,
        mut dataset: Dataset,
        commit_message: &str,
    ) -> Result<SaveOutcome, CacheError> {
        dataset.tier = Tier::Local;
        dataset.remote_url = None;
        dataset.synced_at = None;
        self.cache.put(&dataset)?;

        let Some(remote) = &self.remote else {
            return Ok(SaveOutcome {
                entry: dataset.entry(),
                remote: RemoteOutcome::Disabled,
            });
        };

        let payload = match serde_json::to_vec_pretty(&dataset) {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(SaveOutcome {
                    entry: dataset.entry(),
                    remote: RemoteOutcome::Failed(RemoteError::Encode(e.to_string())),
                })
            }
        };

        let path = self.remote_path(&dataset.name);
        match remote.write(&path, &payload, commit_message).await {
            Ok(receipt) => {
                debug!("Remote revision of {} is {}", path, receipt.revision);
                dataset.tier = Tier::Both;
                dataset.remote_url = Some(receipt.locator.clone());
                dataset.synced_at = Some(Utc::now());
                self.cache.put(&dataset)?;
                Ok(SaveOutcome {
                    entry: dataset.entry(),
                    remote: RemoteOutcome::Uploaded {
                        locator: receipt.locator,
                    },
                })
            }
            Err(e) => {
                warn!("Upload of {} failed, kept locally: {}", path, e);
                Ok(SaveOutcome {
                    entry: dataset.entry(),
                    remote: RemoteOutcome::Failed(e),
                })
            }
        }
    }

    /// Load a dataset, refreshing it from remote when it lives there.
    pub async fn load_dataset(&self, name: &str) -> Result<LoadOutcome, CacheError> {
        let local = self.cache.get(name)?;

        if !local.tier.includes_remote() {
            return Ok(LoadOutcome {
                dataset: local,
                remote: RemoteOutcome::LocalOnly,
            });
        }
        let Some(remote) = &self.remote else {
            return Ok(LoadOutcome {
                dataset: local,
                remote: RemoteOutcome::Disabled,
            });
        };

        let path = self.remote_path(name);
        let fetched = match remote.read(&path).await {
            Ok(blob) => serde_json::from_slice::<Dataset>(&blob.content)
                .map(|ds| (ds, blob.locator))
                .map_err(|e| RemoteError::Decode(e.to_string())),
            Err(e) => Err(e),
        };

        match fetched {
            Ok((remote_copy, locator)) => {
                let refreshed = Dataset {
                    name: local.name.clone(),
                    tier: local.tier,
                    remote_url: local.remote_url.clone().or(locator),
                    synced_at: Some(Utc::now()),
                    ..remote_copy
                };
                self.cache.put(&refreshed)?;
                debug!("Refreshed {} from remote", name);
                Ok(LoadOutcome {
                    dataset: refreshed,
                    remote: RemoteOutcome::Refreshed,
                })
            }
            Err(e) => {
                warn!("Refresh of {} failed, using cached copy: {}", path, e);
                Ok(LoadOutcome {
                    dataset: local,
                    remote: RemoteOutcome::Failed(e),
                })
            }
        }
    }

    /// Delete remotely when applicable, then always delete locally.
    pub async fn delete_dataset(&self, name: &str) -> Result<DeleteOutcome, CacheError> {
        let index = self.cache.list()?;
        let Some(entry) = index.get(name) else {
            return Ok(DeleteOutcome {
                removed: false,
                remote: RemoteOutcome::LocalOnly,
            });
        };

        let remote_outcome = if entry.tier.includes_remote() {
            match &self.remote {
                Some(remote) => {
                    let message = format!("Delete: {}", name);
                    self.delete_remote(remote.as_ref(), name, &message).await
                }
                None => RemoteOutcome::Disabled,
            }
        } else {
            RemoteOutcome::LocalOnly
        };

        let removed = self.cache.delete(name)?;
        Ok(DeleteOutcome {
            removed,
            remote: remote_outcome,
        })
    }

    async fn delete_remote(
        &self,
        remote: &dyn RemoteStore,
        name: &str,
        message: &str,
    ) -> RemoteOutcome {
        let path = self.remote_path(name);
        match remote.delete(&path, message).await {
            Ok(()) => RemoteOutcome::Deleted,
            Err(e) if e.is_not_found() => {
                debug!("{} was already absent remotely", path);
                RemoteOutcome::Deleted
            }
            Err(e) => {
                warn!("Remote delete of {} failed: {}", path, e);
                RemoteOutcome::Failed(e)
            }
        }
    }

    /// Pull remote-only datasets into the local cache.
    ///
    /// Additive only: local entries are never overwritten or pruned. A
    /// listing failure is reported in the returned report, not as an error.
    pub async fn reconcile(&self) -> Result<ReconcileReport, CacheError> {
        let Some(remote) = &self.remote else {
            return Ok(ReconcileReport::with_outcome(RemoteOutcome::Disabled));
        };

        let remote_entries = match remote.list(&self.folder).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Listing remote folder {} failed: {}", self.folder, e);
                return Ok(ReconcileReport::with_outcome(RemoteOutcome::Failed(e)));
            }
        };

        let local = self.cache.list()?;
        debug!("Local datasets before reconcile: {:?}", local.names());
        let mut report = ReconcileReport::with_outcome(RemoteOutcome::Reconciled);
        report.remote_count = remote_entries.len();

        for entry in remote_entries.into_iter().filter(|e| !local.contains(&e.name)) {
            debug!(
                "Downloading {} ({} bytes, revision {})",
                entry.name, entry.size, entry.revision
            );
            let path = self.remote_path(&entry.name);

            let downloaded = match remote.read(&path).await {
                Ok(blob) => serde_json::from_slice::<Dataset>(&blob.content)
                    .map(|ds| (ds, blob.locator))
                    .map_err(|e| RemoteError::Decode(e.to_string()).to_string()),
                Err(e) => Err(e.to_string()),
            };

            let stored = downloaded.and_then(|(remote_copy, locator)| {
                let dataset = Dataset {
                    name: entry.name.clone(),
                    tier: Tier::Remote,
                    remote_url: entry.locator.clone().or(locator),
                    synced_at: Some(Utc::now()),
                    ..remote_copy
                };
                self.cache.put(&dataset).map_err(|e| e.to_string())
            });

            match stored {
                Ok(()) => report.downloaded.push(entry.name),
                Err(reason) => {
                    warn!("Could not pull {}: {}", entry.name, reason);
                    report.failed.push((entry.name, reason));
                }
            }
        }

        info!(
            "Reconciled: {} remote, {} downloaded, {} failed",
            report.remote_count,
            report.downloaded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Reconcile best-effort, then return the local index.
    pub async fn list_datasets(&self) -> Result<Listing, CacheError> {
        let reconcile = self.reconcile().await?;
        let index = self.cache.list()?;
        Ok(Listing { index, reconcile })
    }

    /// Delete every dataset, remote copies first.
    pub async fn clear_all(&self) -> Result<ClearOutcome, CacheError> {
        let index = self.cache.list()?;
        let mut outcome = ClearOutcome::default();

        if let Some(remote) = &self.remote {
            for entry in index.entries.iter().filter(|e| e.tier.includes_remote()) {
                match self
                    .delete_remote(remote.as_ref(), &entry.name, "Bulk delete all files")
                    .await
                {
                    RemoteOutcome::Failed(e) => {
                        outcome.remote_failures.push((entry.name.clone(), e))
                    }
                    _ => outcome.remote_deleted += 1,
                }
            }
        }

        outcome.removed = self.cache.clear()?;
        Ok(outcome)
    }
}

/// Build a dataset name from a source file name and a timestamp.
///
/// `Sales Q1.xlsx` at 2026-03-01T08:30:00.250Z becomes
/// `Sales_Q1_2026-03-01T08-30-00-250Z.json`.
pub fn dataset_file_name(source_name: &str, at: DateTime<Utc>) -> String {
    let stem = match source_name.rfind('.') {
        Some(dot) if dot > 0 && !source_name[dot + 1..].contains('/') => &source_name[..dot],
        _ => source_name,
    };
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let timestamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}_{}.json", stem, timestamp)
}
