//! Sync session state machine.

use crate::config::{SessionConfig, StaleRevisionPolicy};
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteCollection;
use crate::snapshot::RemoteSnapshot;
use notesync_protocol::{
    CollectionMetadata, NoteOperation, NoteSource, NoteTranslator, NoteUpdate, SyncLockInfo,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The transaction state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transaction is open.
    Idle,
    /// A transaction is open and accepts operations.
    Open,
    /// A commit started and did not complete. The session must begin a new
    /// transaction (or cancel) before reuse.
    Committing,
}

impl SessionState {
    /// Returns true if a new transaction may begin.
    pub fn can_begin(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Committing)
    }

    /// Returns true if operations may be queued.
    pub fn accepts_operations(&self) -> bool {
        *self == SessionState::Open
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "Idle",
            SessionState::Open => "Open",
            SessionState::Committing => "Committing",
        };
        f.write_str(name)
    }
}

/// Statistics about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Successful commits.
    pub commits: u64,
    /// Transactions cancelled.
    pub cancels: u64,
    /// Uploads submitted by successful commits.
    pub uploads_submitted: u64,
    /// Deletes submitted by successful commits.
    pub deletes_submitted: u64,
    /// Snapshot refreshes performed.
    pub refreshes: u64,
    /// Time of the last successful commit.
    pub last_commit_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// The operations a reconciliation driver needs from a sync target.
///
/// Object safe, so a driver can hold several targets as `dyn SyncTarget`.
pub trait SyncTarget {
    /// Stable identity of the target.
    fn id(&self) -> &str;

    /// Opens a transaction.
    fn begin_sync_transaction(&mut self) -> SyncResult<()>;

    /// Discards the open transaction.
    fn cancel_sync_transaction(&mut self);

    /// Submits the open transaction; returns the new latest revision.
    fn commit_sync_transaction(&mut self) -> SyncResult<i64>;

    /// Queues note uploads.
    fn upload_notes(&mut self, notes: &[&dyn NoteSource]) -> SyncResult<()>;

    /// Queues note deletions.
    fn delete_notes(&mut self, guids: &[String]) -> SyncResult<()>;

    /// Returns notes changed after `revision`, keyed by identifier.
    fn note_updates_since(&mut self, revision: i64) -> SyncResult<HashMap<String, NoteUpdate>>;

    /// Returns the latest remote revision.
    fn latest_revision(&mut self) -> SyncResult<i64>;

    /// Returns the lock currently held on the target, if any.
    fn current_sync_lock(&self) -> Option<SyncLockInfo>;

    /// Returns the identifiers of every stored note.
    fn all_note_uuids(&mut self) -> SyncResult<Vec<String>>;
}

/// A sync session against one remote note collection.
///
/// A session runs at most one transaction at a time:
///
/// ```text
/// Idle --begin--> Open --queue_*--> Open --commit ok--> Idle
///                  |                        |
///                  +--cancel--> Idle        +--commit failed--> Committing
/// Committing --begin--> Open, Committing --cancel--> Idle
/// ```
///
/// Every transactional method takes `&mut self`, so callers are
/// serialized by the borrow checker. The pending buffer is never handed
/// out by reference.
pub struct SyncSession<R: RemoteCollection> {
    config: SessionConfig,
    remote: Arc<R>,
    translator: NoteTranslator,
    snapshot: RemoteSnapshot,
    state: SessionState,
    pending: Vec<NoteOperation>,
    begin_revision: Option<i64>,
    stats: SessionStats,
}

impl<R: RemoteCollection> SyncSession<R> {
    /// Creates a new session.
    pub fn new(config: SessionConfig, remote: R) -> Self {
        Self::with_shared_remote(config, Arc::new(remote))
    }

    /// Creates a session over a remote shared with other sessions.
    pub fn with_shared_remote(config: SessionConfig, remote: Arc<R>) -> Self {
        Self {
            config,
            remote,
            translator: NoteTranslator::new(),
            snapshot: RemoteSnapshot::new(),
            state: SessionState::Idle,
            pending: Vec::new(),
            begin_revision: None,
            stats: SessionStats::default(),
        }
    }

    /// Replaces the note translator, e.g. to share a tag registry.
    pub fn with_translator(mut self, translator: NoteTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Gets the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the remote collection.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the note translator.
    pub fn translator(&self) -> &NoteTranslator {
        &self.translator
    }

    /// Returns the number of queued operations.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns a copy of the queued operations.
    pub fn pending_operations(&self) -> Vec<NoteOperation> {
        self.pending.clone()
    }

    /// Returns a copy of the cached remote metadata.
    pub fn snapshot(&self) -> Option<CollectionMetadata> {
        self.snapshot.metadata().cloned()
    }

    /// Returns the session identity: the server URL.
    pub fn identity(&self) -> &str {
        &self.config.server_url
    }

    /// Returns the lock held on the remote collection.
    ///
    /// The web sync protocol takes no server-side lock, so this is always
    /// `None`.
    pub fn current_lock(&self) -> Option<SyncLockInfo> {
        None
    }

    /// Opens a transaction.
    ///
    /// Refreshes the remote snapshot and remembers its revision for the
    /// staleness check at commit. Beginning after a failed commit drops the
    /// operations left from it. Fails with `InvalidState` while a
    /// transaction is already open.
    pub fn begin(&mut self) -> SyncResult<()> {
        if !self.state.can_begin() {
            return Err(self.invalid_state("begin"));
        }

        let revision = self.refresh()?;

        if self.state == SessionState::Committing && !self.pending.is_empty() {
            warn!(
                target_id = %self.config.server_url,
                discarded = self.pending.len(),
                "discarding operations left by a failed commit"
            );
        }
        self.pending.clear();
        self.begin_revision = Some(revision);
        self.state = SessionState::Open;

        info!(target_id = %self.config.server_url, revision, "sync transaction started");
        Ok(())
    }

    /// Discards the open transaction without contacting the remote.
    pub fn cancel(&mut self) {
        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "cancelling sync transaction");
        }
        if self.state != SessionState::Idle {
            self.stats.cancels += 1;
        }
        self.pending.clear();
        self.begin_revision = None;
        self.state = SessionState::Idle;
    }

    /// Submits every queued operation as one update.
    ///
    /// Refreshes the snapshot first. If the remote revision moved since
    /// `begin`, the configured [`StaleRevisionPolicy`] decides between a
    /// `Conflict` error and submitting anyway. An empty transaction makes no
    /// remote call. On failure the queued operations are kept and the
    /// session stays `Committing` until the next `begin` or `cancel`.
    ///
    /// Returns the remote's latest revision after the update.
    pub fn commit(&mut self) -> SyncResult<i64> {
        if !self.state.accepts_operations() {
            return Err(self.invalid_state("commit"));
        }
        self.state = SessionState::Committing;

        match self.submit_pending() {
            Ok(revision) => {
                let (uploads, deletes) = self.count_pending();
                self.pending.clear();
                self.begin_revision = None;
                self.state = SessionState::Idle;

                self.stats.commits += 1;
                self.stats.uploads_submitted += uploads;
                self.stats.deletes_submitted += deletes;
                self.stats.last_commit_time = Some(Instant::now());
                self.stats.last_error = None;

                info!(
                    target_id = %self.config.server_url,
                    revision,
                    uploads,
                    deletes,
                    "sync transaction committed"
                );
                Ok(revision)
            }
            Err(e) => {
                warn!(target_id = %self.config.server_url, error = %e, "sync commit failed");
                self.stats.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Queues deletion of the given notes, in order.
    pub fn queue_delete<I, S>(&mut self, guids: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.state.accepts_operations() {
            return Err(self.invalid_state("queue deletes"));
        }
        self.pending
            .extend(guids.into_iter().map(NoteOperation::delete));
        Ok(())
    }

    /// Translates the given notes and queues their upload, in order.
    pub fn queue_upload<'a, I, N>(&mut self, notes: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = &'a N>,
        N: NoteSource + ?Sized + 'a,
    {
        if !self.state.accepts_operations() {
            return Err(self.invalid_state("queue uploads"));
        }
        for note in notes {
            let record = self.translator.to_wire(note);
            self.pending.push(NoteOperation::Upload(record));
        }
        Ok(())
    }

    /// Returns every note changed after `revision`, keyed by identifier.
    ///
    /// Runs outside the transaction buffer and is legal in any state.
    pub fn list_changes_since(&mut self, revision: i64) -> SyncResult<HashMap<String, NoteUpdate>> {
        self.refresh()?;
        let principal = self.snapshot.principal()?.clone();
        let notes = self.track(self.remote.fetch_notes(&principal, Some(revision)))?;

        let mut updates = HashMap::with_capacity(notes.len());
        for note in &notes {
            let update = self.translator.to_update(note)?;
            if let Some(previous) = updates.insert(update.guid.clone(), update) {
                warn!(
                    guid = %previous.guid,
                    "remote returned the same note twice; keeping the last one"
                );
            }
        }

        debug!(since = revision, changed = updates.len(), "listed remote changes");
        Ok(updates)
    }

    /// Refreshes the snapshot and returns the remote's latest revision.
    pub fn current_revision(&mut self) -> SyncResult<i64> {
        self.refresh()
    }

    /// Returns the identifiers of every note in the remote collection.
    ///
    /// Performs a full, unfiltered fetch.
    pub fn list_all_identifiers(&mut self) -> SyncResult<Vec<String>> {
        self.refresh()?;
        let principal = self.snapshot.principal()?.clone();
        let notes = self.track(self.remote.fetch_notes(&principal, None))?;
        Ok(notes.iter().map(|note| note.guid().to_string()).collect())
    }

    /// Refreshes the snapshot and returns the latest revision.
    fn refresh(&mut self) -> SyncResult<i64> {
        let result = self
            .snapshot
            .refresh(
                self.remote.as_ref(),
                &self.config.server_url,
                &self.config.user_name,
            )
            .map(|metadata| metadata.latest_revision);
        self.stats.refreshes += 1;
        self.track(result)
    }

    fn submit_pending(&mut self) -> SyncResult<i64> {
        let actual = self.refresh()?;
        let expected = self.begin_revision.unwrap_or(actual);

        if actual != expected {
            match self.config.stale_revision_policy {
                StaleRevisionPolicy::Reject => {
                    return Err(SyncError::Conflict { expected, actual });
                }
                StaleRevisionPolicy::LastWriterWins => {
                    warn!(
                        expected,
                        actual, "remote revision advanced during transaction; overwriting"
                    );
                }
            }
        }

        if self.pending.is_empty() {
            debug!("nothing to commit");
            return Ok(actual);
        }

        let principal = self.snapshot.principal()?.clone();
        let revision = self
            .remote
            .apply_update(&principal, Some(actual + 1), &self.pending)?;
        self.snapshot.record_revision(revision);
        Ok(revision)
    }

    fn count_pending(&self) -> (u64, u64) {
        let uploads = self
            .pending
            .iter()
            .filter(|op| matches!(op, NoteOperation::Upload(_)))
            .count() as u64;
        (uploads, self.pending.len() as u64 - uploads)
    }

    fn track<T>(&mut self, result: SyncResult<T>) -> SyncResult<T> {
        if let Err(ref e) = result {
            self.stats.last_error = Some(e.to_string());
        }
        result
    }

    fn invalid_state(&self, operation: &str) -> SyncError {
        SyncError::InvalidState {
            state: self.state.to_string(),
            operation: operation.into(),
        }
    }
}

impl<R: RemoteCollection> SyncTarget for SyncSession<R> {
    fn id(&self) -> &str {
        self.identity()
    }

    fn begin_sync_transaction(&mut self) -> SyncResult<()> {
        self.begin()
    }

    fn cancel_sync_transaction(&mut self) {
        self.cancel();
    }

    fn commit_sync_transaction(&mut self) -> SyncResult<i64> {
        self.commit()
    }

    fn upload_notes(&mut self, notes: &[&dyn NoteSource]) -> SyncResult<()> {
        self.queue_upload(notes.iter().copied())
    }

    fn delete_notes(&mut self, guids: &[String]) -> SyncResult<()> {
        self.queue_delete(guids.iter().cloned())
    }

    fn note_updates_since(&mut self, revision: i64) -> SyncResult<HashMap<String, NoteUpdate>> {
        self.list_changes_since(revision)
    }

    fn latest_revision(&mut self) -> SyncResult<i64> {
        self.current_revision()
    }

    fn current_sync_lock(&self) -> Option<SyncLockInfo> {
        self.current_lock()
    }

    fn all_note_uuids(&mut self) -> SyncResult<Vec<String>> {
        self.list_all_identifiers()
    }
}
