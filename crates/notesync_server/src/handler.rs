//! Request handlers for the web sync endpoints.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::NoteStore;
use notesync_protocol::{
    NoteChangesRequest, NoteIndexResponse, NoteStub, NotesResponse, ResourceRef, UserResponse,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Note store (shared across all handlers).
    pub store: Arc<NoteStore>,
    validator: Option<TokenValidator>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<NoteStore>) -> Self {
        let validator = match (&config.auth_secret, config.require_auth) {
            (Some(secret), true) => Some(TokenValidator::new(
                AuthConfig::new(secret.clone()).with_expiry(config.token_expiry),
            )),
            _ => None,
        };
        Self {
            config,
            store,
            validator,
        }
    }

    /// Returns the token validator, if authentication is enabled.
    pub fn validator(&self) -> Option<&TokenValidator> {
        self.validator.as_ref()
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Checks the `Authorization` header for a request on `user_name`.
    pub fn authorize(&self, user_name: &str, authorization: Option<&str>) -> ServerResult<()> {
        let Some(validator) = self.context.validator() else {
            return Ok(());
        };

        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ServerError::AuthenticationFailed("missing bearer token".into()))?;
        validator.validate_token(token.trim(), user_name).map_err(|e| {
            warn!(user = user_name, error = %e, "rejected access token");
            e
        })
    }

    /// Handles `GET /api/{version}/{user}`.
    pub fn handle_user(&self, user_name: &str) -> ServerResult<UserResponse> {
        let info = self.context.store.user(user_name)?;
        Ok(UserResponse {
            user_name: info.user_name,
            first_name: info.first_name,
            last_name: info.last_name,
            notes_ref: ResourceRef::api(self.context.config.notes_url(user_name)),
            latest_sync_revision: info.latest_revision,
            current_sync_guid: info.current_sync_guid,
        })
    }

    /// Handles `GET {notes}?include_notes=true[&since=N]`.
    pub fn handle_get_notes(
        &self,
        user_name: &str,
        since: Option<i64>,
    ) -> ServerResult<NotesResponse> {
        let (latest_sync_revision, notes) = self.context.store.notes_since(user_name, since)?;
        debug!(user = user_name, ?since, count = notes.len(), "serving notes");
        Ok(NotesResponse {
            latest_sync_revision,
            notes,
        })
    }

    /// Handles `GET {notes}[?since=N]`, returning references only.
    pub fn handle_note_index(
        &self,
        user_name: &str,
        since: Option<i64>,
    ) -> ServerResult<NoteIndexResponse> {
        let (latest_sync_revision, notes) = self.context.store.notes_since(user_name, since)?;
        let notes_url = self.context.config.notes_url(user_name);
        Ok(NoteIndexResponse {
            latest_sync_revision,
            notes: notes
                .iter()
                .map(|note| NoteStub {
                    guid: note.guid().to_string(),
                    title: Some(note.title.clone()),
                    resource: Some(ResourceRef::api(format!(
                        "{notes_url}/{}",
                        urlencoding::encode(note.guid())
                    ))),
                })
                .collect(),
        })
    }

    /// Handles `PUT {notes}`.
    ///
    /// Responds with the new latest revision and references to the changed
    /// notes.
    pub fn handle_put_notes(
        &self,
        user_name: &str,
        request: NoteChangesRequest,
    ) -> ServerResult<NoteIndexResponse> {
        let max = self.context.config.max_changes_per_update;
        if request.note_changes.len() > max {
            return Err(ServerError::InvalidRequest(format!(
                "Too many changes: {} > {}",
                request.note_changes.len(),
                max
            )));
        }

        let expected_revision = request.latest_sync_revision;
        let operations = request.into_operations()?;
        let notes_url = self.context.config.notes_url(user_name);
        let stubs: Vec<NoteStub> = operations
            .iter()
            .map(|op| NoteStub {
                guid: op.guid().to_string(),
                title: None,
                resource: Some(ResourceRef::api(format!(
                        "{notes_url}/{}",
                        urlencoding::encode(op.guid())
                    ))),
            })
            .collect();

        let revision = self
            .context
            .store
            .apply(user_name, expected_revision, operations)?;
        info!(user = user_name, revision, changes = stubs.len(), "note update applied");

        Ok(NoteIndexResponse {
            latest_sync_revision: revision,
            notes: stubs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_protocol::{now, ContentVersion, NoteOperation, NoteRecord};

    fn create_handler(config: ServerConfig) -> RequestHandler {
        let store = Arc::new(NoteStore::new());
        store.create_user("sandy", Some("Sandy".into()), None).unwrap();
        let context = Arc::new(HandlerContext::new(config, store));
        RequestHandler::new(context)
    }

    fn upload(guid: &str) -> NoteOperation {
        NoteOperation::Upload(
            NoteRecord::new(guid, "Title", now()).with_content(ContentVersion::DEFAULT, "body"),
        )
    }

    #[test]
    fn user_resource() {
        let handler = create_handler(ServerConfig::new("https://notes.example.com"));
        let user = handler.handle_user("sandy").unwrap();

        assert_eq!(user.first_name.as_deref(), Some("Sandy"));
        assert_eq!(user.latest_sync_revision, 0);
        assert_eq!(
            user.notes_ref.api_ref,
            "https://notes.example.com/api/1.0/sandy/notes"
        );
        assert!(matches!(
            handler.handle_user("alex"),
            Err(ServerError::UnknownUser(_))
        ));
    }

    #[test]
    fn put_and_get_notes() {
        let handler = create_handler(ServerConfig::default());
        let request = NoteChangesRequest::from_operations(Some(1), &[upload("a"), upload("b")]);

        let response = handler.handle_put_notes("sandy", request).unwrap();
        assert_eq!(response.latest_sync_revision, 1);
        assert_eq!(response.notes.len(), 2);

        let notes = handler.handle_get_notes("sandy", Some(0)).unwrap();
        assert_eq!(notes.notes.len(), 2);
        assert!(handler
            .handle_get_notes("sandy", Some(1))
            .unwrap()
            .notes
            .is_empty());

        let index = handler.handle_note_index("sandy", None).unwrap();
        assert_eq!(index.notes[0].guid, "a");
        assert!(index.notes[0]
            .resource
            .as_ref()
            .unwrap()
            .api_ref
            .ends_with("/sandy/notes/a"));
    }

    #[test]
    fn put_too_many_changes() {
        let handler = create_handler(ServerConfig::default().with_max_changes_per_update(1));
        let request = NoteChangesRequest::from_operations(None, &[upload("a"), upload("b")]);

        let err = handler.handle_put_notes("sandy", request).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[test]
    fn put_revision_conflict() {
        let handler = create_handler(ServerConfig::default());
        let request = NoteChangesRequest::from_operations(Some(5), &[upload("a")]);

        let err = handler.handle_put_notes("sandy", request).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn auth_disabled_accepts_anything() {
        let handler = create_handler(ServerConfig::default());
        assert!(handler.authorize("sandy", None).is_ok());
    }

    #[test]
    fn auth_enabled() {
        let config = ServerConfig::default().with_auth(b"secret".to_vec());
        let handler = create_handler(config);
        let token = handler
            .context
            .validator()
            .unwrap()
            .create_token("sandy")
            .unwrap();

        assert!(handler
            .authorize("sandy", Some(&format!("Bearer {token}")))
            .is_ok());
        assert_eq!(
            handler.authorize("sandy", None).unwrap_err().status_code(),
            401
        );
        assert_eq!(
            handler
                .authorize("sandy", Some(token.as_str()))
                .unwrap_err()
                .status_code(),
            401
        );
        assert_eq!(
            handler
                .authorize("alex", Some(&format!("Bearer {token}")))
                .unwrap_err()
                .status_code(),
            403
        );
    }
}
