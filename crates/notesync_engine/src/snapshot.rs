//! Read-through cache of remote collection metadata.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteCollection;
use notesync_protocol::{CollectionMetadata, PrincipalInfo};
use tracing::debug;

/// Cached metadata of one remote collection.
///
/// The remote never pushes invalidations, so the cache is refreshed
/// explicitly before every revision-sensitive operation. Each session owns
/// its own snapshot.
#[derive(Debug, Default)]
pub struct RemoteSnapshot {
    metadata: Option<CollectionMetadata>,
}

impl RemoteSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-fetches the metadata and returns it.
    ///
    /// On failure the previous snapshot is kept.
    pub fn refresh<R: RemoteCollection + ?Sized>(
        &mut self,
        remote: &R,
        server_url: &str,
        user_name: &str,
    ) -> SyncResult<&CollectionMetadata> {
        let metadata = remote.fetch_metadata(server_url, user_name)?;
        debug!(
            server_url,
            user_name,
            revision = metadata.latest_revision,
            "refreshed remote snapshot"
        );
        Ok(self.metadata.insert(metadata))
    }

    /// Returns the cached metadata, if any was fetched.
    pub fn metadata(&self) -> Option<&CollectionMetadata> {
        self.metadata.as_ref()
    }

    /// Returns the cached principal, failing if nothing was fetched yet.
    pub fn principal(&self) -> SyncResult<&PrincipalInfo> {
        self.metadata
            .as_ref()
            .map(|m| &m.principal)
            .ok_or_else(|| SyncError::Protocol("remote snapshot was never refreshed".into()))
    }

    /// Returns the cached latest revision.
    pub fn latest_revision(&self) -> Option<i64> {
        self.metadata.as_ref().map(|m| m.latest_revision)
    }

    /// Records a revision reported by the remote after an update.
    pub(crate) fn record_revision(&mut self, revision: i64) {
        if let Some(metadata) = self.metadata.as_mut() {
            metadata.latest_revision = revision;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockFailure, MockRemoteCollection};

    fn remote(revision: i64) -> MockRemoteCollection {
        MockRemoteCollection::new(CollectionMetadata {
            latest_revision: revision,
            principal: PrincipalInfo {
                user_name: "sandy".into(),
                first_name: None,
                last_name: None,
                notes_ref: "mock://sandy/notes".into(),
                current_sync_guid: "guid".into(),
            },
        })
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = RemoteSnapshot::new();
        assert!(snapshot.metadata().is_none());
        assert!(snapshot.principal().is_err());
    }

    #[test]
    fn refresh_reads_through() {
        let remote = remote(5);
        let mut snapshot = RemoteSnapshot::new();

        assert_eq!(snapshot.refresh(&remote, "mock://", "sandy").unwrap().latest_revision, 5);
        remote.advance_revision(2);
        assert_eq!(snapshot.latest_revision(), Some(5));
        assert_eq!(snapshot.refresh(&remote, "mock://", "sandy").unwrap().latest_revision, 7);
        assert_eq!(snapshot.principal().unwrap().user_name, "sandy");
    }

    #[test]
    fn failed_refresh_keeps_previous() {
        let remote = remote(5);
        let mut snapshot = RemoteSnapshot::new();
        snapshot.refresh(&remote, "mock://", "sandy").unwrap();

        remote.fail_next(MockFailure::Transport);
        assert!(snapshot.refresh(&remote, "mock://", "sandy").is_err());
        assert_eq!(snapshot.latest_revision(), Some(5));
    }
}
