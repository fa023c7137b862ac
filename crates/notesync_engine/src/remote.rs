//! Access to the remote note collection.

use crate::error::{SyncError, SyncResult};
use notesync_protocol::{CollectionMetadata, NoteOperation, NoteRecord, PrincipalInfo};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A remote collection holds one user's notes, stamped with revisions.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process server, mock for testing, etc.).
/// Every call blocks until the remote answers. Implementations do not
/// retry.
pub trait RemoteCollection: Send + Sync {
    /// Fetches the collection's latest revision and owner.
    fn fetch_metadata(&self, server_url: &str, user_name: &str) -> SyncResult<CollectionMetadata>;

    /// Fetches notes, only those whose last sync revision exceeds `since`
    /// when it is given.
    fn fetch_notes(
        &self,
        principal: &PrincipalInfo,
        since: Option<i64>,
    ) -> SyncResult<Vec<NoteRecord>>;

    /// Applies all operations as one update and returns the new latest
    /// revision.
    ///
    /// `expected_revision` is the revision the update should produce; a
    /// remote that tracks it rejects the update when it would produce
    /// another one.
    fn apply_update(
        &self,
        principal: &PrincipalInfo,
        expected_revision: Option<i64>,
        operations: &[NoteOperation],
    ) -> SyncResult<i64>;
}

/// Failure injected into a [`MockRemoteCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Remote unreachable.
    Transport,
    /// Principal rejected.
    Authorization,
    /// Update rejected.
    Validation,
}

impl MockFailure {
    fn to_error(self) -> SyncError {
        match self {
            MockFailure::Transport => SyncError::transport_retryable("mock remote unreachable"),
            MockFailure::Authorization => SyncError::Authorization("mock principal rejected".into()),
            MockFailure::Validation => SyncError::Validation("mock update rejected".into()),
        }
    }
}

/// A mock remote collection for testing.
///
/// Serves canned metadata and notes, and records every update it receives.
#[derive(Debug, Default)]
pub struct MockRemoteCollection {
    metadata: Mutex<Option<CollectionMetadata>>,
    notes: Mutex<Vec<NoteRecord>>,
    updates: Mutex<Vec<Vec<NoteOperation>>>,
    next_failure: Mutex<Option<MockFailure>>,
    update_failure: Mutex<Option<MockFailure>>,
    disconnected: AtomicBool,
    metadata_fetches: AtomicUsize,
}

impl MockRemoteCollection {
    /// Creates a mock serving `metadata`.
    pub fn new(metadata: CollectionMetadata) -> Self {
        Self {
            metadata: Mutex::new(Some(metadata)),
            ..Self::default()
        }
    }

    /// Replaces the notes returned by `fetch_notes`.
    pub fn set_notes(&self, notes: Vec<NoteRecord>) {
        *self.notes.lock() = notes;
    }

    /// Moves the remote revision forward, as another client's commit would.
    pub fn advance_revision(&self, by: i64) {
        if let Some(metadata) = self.metadata.lock().as_mut() {
            metadata.latest_revision += by;
        }
    }

    /// Returns the remote's current revision.
    pub fn latest_revision(&self) -> Option<i64> {
        self.metadata.lock().as_ref().map(|m| m.latest_revision)
    }

    /// Makes the next call of any kind fail.
    pub fn fail_next(&self, failure: MockFailure) {
        *self.next_failure.lock() = Some(failure);
    }

    /// Makes every `apply_update` fail until cleared.
    pub fn set_update_failure(&self, failure: Option<MockFailure>) {
        *self.update_failure.lock() = failure;
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Returns every update received, in order.
    pub fn updates(&self) -> Vec<Vec<NoteOperation>> {
        self.updates.lock().clone()
    }

    /// Returns how many times metadata was fetched.
    pub fn metadata_fetches(&self) -> usize {
        self.metadata_fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> SyncResult<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("not connected"));
        }
        match self.next_failure.lock().take() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

impl RemoteCollection for MockRemoteCollection {
    fn fetch_metadata(&self, _server_url: &str, _user_name: &str) -> SyncResult<CollectionMetadata> {
        self.check_available()?;
        self.metadata_fetches.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("No mock metadata set".into()))
    }

    fn fetch_notes(
        &self,
        _principal: &PrincipalInfo,
        since: Option<i64>,
    ) -> SyncResult<Vec<NoteRecord>> {
        self.check_available()?;
        let notes = self.notes.lock();
        Ok(notes
            .iter()
            .filter(|note| match since {
                Some(revision) => note.last_sync_revision.unwrap_or_default() > revision,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn apply_update(
        &self,
        _principal: &PrincipalInfo,
        _expected_revision: Option<i64>,
        operations: &[NoteOperation],
    ) -> SyncResult<i64> {
        self.check_available()?;
        if let Some(failure) = *self.update_failure.lock() {
            return Err(failure.to_error());
        }

        self.updates.lock().push(operations.to_vec());
        let mut metadata = self.metadata.lock();
        let metadata = metadata
            .as_mut()
            .ok_or_else(|| SyncError::Protocol("No mock metadata set".into()))?;
        if !operations.is_empty() {
            metadata.latest_revision += 1;
        }
        Ok(metadata.latest_revision)
    }
}
