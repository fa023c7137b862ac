//! Server-side note storage.

use crate::error::{ServerError, ServerResult};
use notesync_protocol::{NoteOperation, NoteRecord};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Public description of a user's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Login name.
    pub user_name: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Collection identity.
    pub current_sync_guid: String,
    /// Highest stored revision.
    pub latest_revision: i64,
}

struct UserCollection {
    info: UserInfo,
    notes: BTreeMap<String, NoteRecord>,
}

/// In-memory note store.
///
/// The store maintains, per user:
/// - All live notes, keyed by guid
/// - The latest revision, bumped once per non-empty update
/// - The collection identity
#[derive(Default)]
pub struct NoteStore {
    users: RwLock<HashMap<String, UserCollection>>,
}

impl NoteStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with an empty collection at revision 0.
    ///
    /// Returns the collection identity.
    pub fn create_user(
        &self,
        user_name: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> ServerResult<String> {
        if user_name.is_empty()
            || user_name.contains('/')
            || user_name.chars().any(char::is_control)
        {
            return Err(ServerError::InvalidRequest(format!(
                "invalid user name: {user_name:?}"
            )));
        }

        let mut users = self.users.write();
        if users.contains_key(user_name) {
            return Err(ServerError::InvalidRequest(format!(
                "user already exists: {user_name}"
            )));
        }

        let guid = uuid::Uuid::new_v4().to_string();
        users.insert(
            user_name.to_string(),
            UserCollection {
                info: UserInfo {
                    user_name: user_name.to_string(),
                    first_name,
                    last_name,
                    current_sync_guid: guid.clone(),
                    latest_revision: 0,
                },
                notes: BTreeMap::new(),
            },
        );
        Ok(guid)
    }

    /// Returns true if the user exists.
    pub fn has_user(&self, user_name: &str) -> bool {
        self.users.read().contains_key(user_name)
    }

    /// Returns the user's collection description.
    pub fn user(&self, user_name: &str) -> ServerResult<UserInfo> {
        self.users
            .read()
            .get(user_name)
            .map(|c| c.info.clone())
            .ok_or_else(|| ServerError::UnknownUser(user_name.to_string()))
    }

    /// Returns the user's latest revision.
    pub fn latest_revision(&self, user_name: &str) -> ServerResult<i64> {
        self.user(user_name).map(|info| info.latest_revision)
    }

    /// Returns the number of live notes of a user.
    pub fn note_count(&self, user_name: &str) -> ServerResult<usize> {
        self.users
            .read()
            .get(user_name)
            .map(|c| c.notes.len())
            .ok_or_else(|| ServerError::UnknownUser(user_name.to_string()))
    }

    /// Returns the latest revision and the notes changed after `since`, or
    /// every note when `since` is `None`.
    pub fn notes_since(
        &self,
        user_name: &str,
        since: Option<i64>,
    ) -> ServerResult<(i64, Vec<NoteRecord>)> {
        let users = self.users.read();
        let collection = users
            .get(user_name)
            .ok_or_else(|| ServerError::UnknownUser(user_name.to_string()))?;

        let notes = collection
            .notes
            .values()
            .filter(|note| match since {
                Some(revision) => note.last_sync_revision.unwrap_or_default() > revision,
                None => true,
            })
            .cloned()
            .collect();
        Ok((collection.info.latest_revision, notes))
    }

    /// Applies an update atomically.
    ///
    /// When `expected_revision` is given it must equal the current revision
    /// plus one. Every upload is stamped with the new revision. Deleting an
    /// unknown note is not an error. An empty update leaves the revision
    /// unchanged.
    ///
    /// Returns the latest revision after the update.
    pub fn apply(
        &self,
        user_name: &str,
        expected_revision: Option<i64>,
        operations: Vec<NoteOperation>,
    ) -> ServerResult<i64> {
        let mut users = self.users.write();
        let collection = users
            .get_mut(user_name)
            .ok_or_else(|| ServerError::UnknownUser(user_name.to_string()))?;

        let current = collection.info.latest_revision;
        if let Some(requested) = expected_revision {
            if requested != current + 1 {
                return Err(ServerError::RevisionConflict {
                    expected: current + 1,
                    actual: requested,
                });
            }
        }

        if operations.is_empty() {
            return Ok(current);
        }
        if let Some(op) = operations.iter().find(|op| op.guid().is_empty()) {
            return Err(ServerError::InvalidRequest(format!(
                "{} with empty guid",
                op.command().as_str()
            )));
        }

        let revision = current + 1;
        for op in operations {
            match op {
                NoteOperation::Upload(mut record) => {
                    record.last_sync_revision = Some(revision);
                    collection.notes.insert(record.guid().to_string(), record);
                }
                NoteOperation::Delete { guid } => {
                    collection.notes.remove(&guid);
                }
            }
        }
        collection.info.latest_revision = revision;

        debug!(user = user_name, revision, "applied note update");
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_protocol::{now, ContentVersion};

    fn upload(guid: &str) -> NoteOperation {
        NoteOperation::Upload(
            NoteRecord::new(guid, format!("Title {guid}"), now())
                .with_content(ContentVersion::DEFAULT, "body"),
        )
    }

    fn store_with_user() -> NoteStore {
        let store = NoteStore::new();
        store.create_user("sandy", None, None).unwrap();
        store
    }

    #[test]
    fn new_user_is_empty() {
        let store = store_with_user();
        let info = store.user("sandy").unwrap();
        assert_eq!(info.latest_revision, 0);
        assert!(!info.current_sync_guid.is_empty());
        assert_eq!(store.note_count("sandy").unwrap(), 0);
    }

    #[test]
    fn duplicate_and_invalid_users() {
        let store = store_with_user();
        assert!(matches!(
            store.create_user("sandy", None, None),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(store.create_user("", None, None).is_err());
        assert!(store.create_user("a/b", None, None).is_err());
        assert!(store.create_user("a\nb", None, None).is_err());
    }

    #[test]
    fn reserved_characters_make_distinct_users() {
        let store = store_with_user();
        store.create_user("sandy?x", None, None).unwrap();
        store.create_user("sandy b&c", None, None).unwrap();

        store.apply("sandy?x", None, vec![upload("a")]).unwrap();
        assert_eq!(store.note_count("sandy?x").unwrap(), 1);
        assert_eq!(store.note_count("sandy").unwrap(), 0);
    }

    #[test]
    fn unknown_user() {
        let store = NoteStore::new();
        assert!(matches!(
            store.latest_revision("nobody"),
            Err(ServerError::UnknownUser(_))
        ));
        assert!(store.apply("nobody", None, vec![upload("a")]).is_err());
    }

    #[test]
    fn update_bumps_revision_once() {
        let store = store_with_user();

        let revision = store
            .apply("sandy", None, vec![upload("a"), upload("b")])
            .unwrap();
        assert_eq!(revision, 1);

        let (latest, notes) = store.notes_since("sandy", None).unwrap();
        assert_eq!(latest, 1);
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.last_sync_revision == Some(1)));
    }

    #[test]
    fn empty_update_does_not_bump() {
        let store = store_with_user();
        assert_eq!(store.apply("sandy", None, Vec::new()).unwrap(), 0);
        assert_eq!(store.latest_revision("sandy").unwrap(), 0);
    }

    #[test]
    fn since_filters_by_revision() {
        let store = store_with_user();
        store.apply("sandy", None, vec![upload("a")]).unwrap();
        store.apply("sandy", None, vec![upload("b")]).unwrap();
        store.apply("sandy", None, vec![upload("c")]).unwrap();

        let (_, notes) = store.notes_since("sandy", Some(1)).unwrap();
        let guids: Vec<_> = notes.iter().map(|n| n.guid().to_string()).collect();
        assert_eq!(guids, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn delete_removes_note() {
        let store = store_with_user();
        store.apply("sandy", None, vec![upload("a")]).unwrap();
        store
            .apply(
                "sandy",
                None,
                vec![NoteOperation::delete("a"), NoteOperation::delete("unknown")],
            )
            .unwrap();

        assert_eq!(store.note_count("sandy").unwrap(), 0);
        assert_eq!(store.latest_revision("sandy").unwrap(), 2);
    }

    #[test]
    fn expected_revision_mismatch() {
        let store = store_with_user();
        store.apply("sandy", Some(1), vec![upload("a")]).unwrap();

        let err = store.apply("sandy", Some(1), vec![upload("b")]).unwrap_err();
        assert!(matches!(
            err,
            ServerError::RevisionConflict {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(store.note_count("sandy").unwrap(), 1);
    }

    #[test]
    fn invalid_update_is_not_applied() {
        let store = store_with_user();
        let err = store
            .apply("sandy", None, vec![upload("a"), NoteOperation::delete("")])
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
        assert_eq!(store.note_count("sandy").unwrap(), 0);
        assert_eq!(store.latest_revision("sandy").unwrap(), 0);
    }
}
