//! In-memory remote store for tests.
//!
//! Every blob carries a revision. Writes and deletes read the current
//! revision first and commit only if it is still current, like the contents
//! API does. Tests can inject failures per operation, or an external write
//! that lands between the revision read and the commit.

use crate::error::RemoteError;
use crate::storage::remote::{RemoteBlob, RemoteEntry, RemoteStore, RepoAccess, WriteReceipt};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    blobs: BTreeMap<String, (Vec<u8>, String)>,
    next_revision: u64,
    calls: usize,
    fail_reads: bool,
    fail_writes: bool,
    fail_lists: bool,
    fail_deletes: bool,
    race_next_write: bool,
}

impl State {
    fn revision_of(&self, path: &str) -> Option<String> {
        self.blobs.get(path).map(|(_, revision)| revision.clone())
    }

    fn bump(&mut self) -> String {
        self.next_revision += 1;
        format!("rev-{}", self.next_revision)
    }

    /// Store `content` only if `expected` is still the current revision.
    fn commit(
        &mut self,
        path: &str,
        content: &[u8],
        expected: Option<&str>,
    ) -> Result<String, RemoteError> {
        let current = self.revision_of(path);
        if current.as_deref() != expected {
            return Err(RemoteError::Conflict {
                path: path.to_string(),
                message: format!("expected {:?}, found {:?}", expected, current),
            });
        }
        let revision = self.bump();
        self.blobs
            .insert(path.to_string(), (content.to_vec(), revision.clone()));
        Ok(revision)
    }
}

/// Shared handle; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a blob directly, bypassing call accounting.
    pub fn seed(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let revision = state.bump();
        state.blobs.insert(path.to_string(), (content.to_vec(), revision));
    }

    pub fn revision(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().revision_of(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().blobs.contains_key(path)
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().blobs.get(path).map(|(c, _)| c.clone())
    }

    /// Number of trait calls made so far.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_lists(&self, fail: bool) {
        self.state.lock().unwrap().fail_lists = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    /// Make the next write lose a race with an external writer.
    pub fn race_next_write(&self) {
        self.state.lock().unwrap().race_next_write = true;
    }

    fn unreachable() -> RemoteError {
        RemoteError::Unreachable("injected failure".to_string())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn check_access(&self) -> Result<RepoAccess, RemoteError> {
        self.state.lock().unwrap().calls += 1;
        Ok(RepoAccess {
            repo: "test/memory".to_string(),
            default_branch: "main".to_string(),
        })
    }

    async fn read(&self, path: &str) -> Result<RemoteBlob, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_reads {
            return Err(Self::unreachable());
        }
        match state.blobs.get(path) {
            Some((content, revision)) => Ok(RemoteBlob {
                content: content.clone(),
                revision: revision.clone(),
                locator: Some(format!("memory://{}", path)),
            }),
            None => Err(RemoteError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        _message: &str,
    ) -> Result<WriteReceipt, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_writes {
            return Err(Self::unreachable());
        }

        let expected = state.revision_of(path);
        if std::mem::take(&mut state.race_next_write) {
            let external = state.bump();
            state
                .blobs
                .insert(path.to_string(), (b"{}".to_vec(), external));
        }

        let revision = state.commit(path, content, expected.as_deref())?;
        Ok(WriteReceipt {
            locator: format!("memory://{}", path),
            revision,
        })
    }

    async fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_lists {
            return Err(Self::unreachable());
        }
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        Ok(state
            .blobs
            .iter()
            .filter_map(|(path, (content, revision))| {
                let name = path.strip_prefix(&prefix)?;
                (!name.contains('/') && name.ends_with(".json")).then(|| RemoteEntry {
                    name: name.to_string(),
                    size: content.len() as u64,
                    locator: Some(format!("memory://{}", path)),
                    revision: revision.clone(),
                })
            })
            .collect())
    }

    async fn delete(&self, path: &str, _message: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_deletes {
            return Err(Self::unreachable());
        }
        if state.blobs.remove(path).is_none() {
            return Err(RemoteError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_advances_revision() {
        let store = MemoryStore::new();

        let first = store.write("uploads/a.json", b"1", "m").await.unwrap();
        let second = store.write("uploads/a.json", b"2", "m").await.unwrap();
        assert_ne!(first.revision, second.revision);
        assert_eq!(store.revision("uploads/a.json"), Some(second.revision));
        assert_eq!(store.content("uploads/a.json"), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_raced_write_is_conflict() {
        let store = MemoryStore::new();
        store.seed("uploads/a.json", b"mine");
        store.race_next_write();

        let err = store.write("uploads/a.json", b"new", "m").await.unwrap_err();
        assert!(matches!(err, RemoteError::Conflict { .. }));
        assert_eq!(store.content("uploads/a.json"), Some(b"{}".to_vec()));

        store.write("uploads/a.json", b"new", "m").await.unwrap();
        assert_eq!(store.content("uploads/a.json"), Some(b"new".to_vec()));
    }

    #[test]
    fn test_commit_rejects_stale_or_missing_revision() {
        let mut state = State::default();
        let rev = state.commit("p", b"1", None).unwrap();

        assert!(matches!(
            state.commit("p", b"2", None),
            Err(RemoteError::Conflict { .. })
        ));
        assert!(matches!(
            state.commit("p", b"2", Some("rev-0")),
            Err(RemoteError::Conflict { .. })
        ));
        assert!(state.commit("p", b"2", Some(rev.as_str())).is_ok());
    }
}
