//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::NoteStore;
use notesync_protocol::{ErrorResponse, NoteChangesRequest};
use std::sync::Arc;
use tracing::debug;

/// A parsed request route.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    User(String),
    Notes(String),
}

/// The sync server.
///
/// This server answers the web sync API for the users registered in its
/// note store. It is transport-agnostic: an HTTP front end (or an
/// in-process client) passes each request to [`NoteSyncServer::handle`].
///
/// # Example
///
/// ```
/// use notesync_server::{NoteSyncServer, ServerConfig};
///
/// let server = NoteSyncServer::new(ServerConfig::default());
/// server.create_user("sandy").unwrap();
///
/// let (status, _body) = server.handle("GET", "/api/1.0/sandy", None, None, None);
/// assert_eq!(status, 200);
/// ```
pub struct NoteSyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl NoteSyncServer {
    /// Creates a new sync server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(NoteStore::new()))
    }

    /// Creates a sync server with an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<NoteStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Registers a user; returns the collection identity.
    pub fn create_user(&self, user_name: &str) -> ServerResult<String> {
        self.context.store.create_user(user_name, None, None)
    }

    /// Issues an access token for a user.
    pub fn create_token(&self, user_name: &str) -> ServerResult<String> {
        self.context
            .validator()
            .ok_or_else(|| ServerError::Internal("authentication is disabled".into()))?
            .create_token(user_name)
    }

    /// Returns the note store.
    pub fn store(&self) -> &Arc<NoteStore> {
        &self.context.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns a user's latest revision.
    pub fn latest_revision(&self, user_name: &str) -> ServerResult<i64> {
        self.context.store.latest_revision(user_name)
    }

    /// Returns the number of live notes of a user.
    pub fn note_count(&self, user_name: &str) -> ServerResult<usize> {
        self.context.store.note_count(user_name)
    }

    /// Handles one request and returns its status and JSON body.
    ///
    /// Errors become an [`ErrorResponse`] body; revision conflicts also
    /// report the server's revision.
    pub fn handle(
        &self,
        method: &str,
        path: &str,
        query: Option<&str>,
        authorization: Option<&str>,
        body: Option<&[u8]>,
    ) -> (u16, Vec<u8>) {
        debug!(method, path, "handling request");
        match self.dispatch(method, path, query, authorization, body) {
            Ok(body) => (200, body),
            Err(e) => {
                let status = e.status_code();
                let mut response = ErrorResponse::new(e.to_string());
                if let ServerError::RevisionConflict { expected, .. } = e {
                    response.latest_sync_revision = Some(expected - 1);
                }
                (status, response.encode().unwrap_or_default())
            }
        }
    }

    fn dispatch(
        &self,
        method: &str,
        path: &str,
        query: Option<&str>,
        authorization: Option<&str>,
        body: Option<&[u8]>,
    ) -> ServerResult<Vec<u8>> {
        let route = self.route(path)?;
        let user_name = match &route {
            Route::User(user) | Route::Notes(user) => user.as_str(),
        };
        self.handler.authorize(user_name, authorization)?;

        let params = QueryParams::parse(query.unwrap_or_default())?;
        match (method, &route) {
            ("GET", Route::User(user)) => Ok(self.handler.handle_user(user)?.encode()?),
            ("GET", Route::Notes(user)) if params.include_notes => {
                Ok(self.handler.handle_get_notes(user, params.since)?.encode()?)
            }
            ("GET", Route::Notes(user)) => {
                Ok(self.handler.handle_note_index(user, params.since)?.encode()?)
            }
            ("PUT", Route::Notes(user)) => {
                let request = NoteChangesRequest::decode(body.unwrap_or_default())?;
                Ok(self.handler.handle_put_notes(user, request)?.encode()?)
            }
            _ => Err(ServerError::InvalidRequest(format!(
                "method {method} not allowed on {path}"
            ))),
        }
    }

    fn route(&self, path: &str) -> ServerResult<Route> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["api", version, user] if *version == self.context.config.api_version => {
                Ok(Route::User(decode_component(user)?))
            }
            ["api", version, user, "notes"] if *version == self.context.config.api_version => {
                Ok(Route::Notes(decode_component(user)?))
            }
            _ => Err(ServerError::NotFound(path.to_string())),
        }
    }
}

/// Percent-decodes one path segment or query value.
fn decode_component(text: &str) -> ServerResult<String> {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ServerError::InvalidRequest(format!("invalid percent-encoding: {text:?}")))
}

/// Query parameters of the notes resource.
#[derive(Debug, Default, PartialEq, Eq)]
struct QueryParams {
    since: Option<i64>,
    include_notes: bool,
}

impl QueryParams {
    fn parse(query: &str) -> ServerResult<Self> {
        let mut params = QueryParams::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            match decode_component(key)?.as_str() {
                "since" => {
                    let since = value.parse().map_err(|_| {
                        ServerError::InvalidRequest(format!("invalid since: {value:?}"))
                    })?;
                    params.since = Some(since);
                }
                "include_notes" => params.include_notes = value == "true",
                _ => {}
            }
        }
        Ok(params)
    }
}
