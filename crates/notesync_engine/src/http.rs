//! HTTP access to a web sync server.
//!
//! This module maps the remote collection onto the web sync API. The
//! actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, ureq, an in-process server).

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteCollection;
use notesync_protocol::{
    CollectionMetadata, ErrorResponse, NoteChangesRequest, NoteIndexResponse, NoteOperation,
    NoteRecord, NotesResponse, PrincipalInfo, UserResponse,
};
use parking_lot::RwLock;
use std::fmt;
use tracing::{debug, warn};

/// Web sync API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "1.0";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// PUT.
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Put => f.write_str("PUT"),
        }
    }
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL, query included.
    pub url: String,
    /// Value of the `Authorization` header.
    pub authorization: Option<String>,
    /// JSON body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            authorization: None,
            body: None,
        }
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Put,
            url: url.into(),
            authorization: None,
            body: Some(body),
        }
    }

    /// Splits the URL into path and query.
    pub fn path_and_query(&self) -> (&str, Option<&str>) {
        let after_scheme = match self.url.find("://") {
            Some(i) => &self.url[i + 3..],
            None => self.url.as_str(),
        };
        let path = match after_scheme.find('/') {
            Some(i) => &after_scheme[i..],
            None => "/",
        };
        match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        }
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. `Err` means
/// no response was received at all.
pub trait HttpClient: Send + Sync {
    /// Sends a request and waits for the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// A remote collection reached over the web sync API.
///
/// Requests are authorized with a bearer token when one is configured.
pub struct HttpRemoteCollection<C: HttpClient> {
    client: C,
    access_token: Option<String>,
    api_version: String,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteCollection<C> {
    /// Creates a new HTTP remote collection.
    pub fn new(client: C) -> Self {
        Self {
            client,
            access_token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the access token sent with every request.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the API version segment of the user URL.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Returns the API version.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns true if the client reports itself healthy.
    pub fn is_connected(&self) -> bool {
        self.client.is_healthy()
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Builds the user URL: `{server}/api/{version}/{user}`, with the user
    /// name percent-encoded.
    pub fn user_url(&self, server_url: &str, user_name: &str) -> String {
        format!(
            "{}/api/{}/{}",
            server_url.trim_end_matches('/'),
            self.api_version,
            urlencoding::encode(user_name)
        )
    }

    fn send(&self, mut request: HttpRequest) -> SyncResult<HttpResponse> {
        if !self.client.is_healthy() {
            return Err(SyncError::transport_retryable("http client is not healthy"));
        }
        request.authorization = self.access_token.as_ref().map(|t| format!("Bearer {t}"));

        debug!(method = %request.method, url = %request.url, "sending request");
        self.client.send(request).map_err(|e| {
            warn!(error = %e, "request failed");
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })
    }

    fn execute(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        let response = self.send(request)?;
        self.check(response)
    }

    fn check(&self, response: HttpResponse) -> SyncResult<HttpResponse> {
        if response.is_success() {
            *self.last_error.write() = None;
            Ok(response)
        } else {
            let err = status_error(response.status, &response.body);
            *self.last_error.write() = Some(err.to_string());
            Err(err)
        }
    }
}

/// Maps a failed response to an error.
fn status_error(status: u16, body: &[u8]) -> SyncError {
    let detail = match ErrorResponse::decode(body) {
        Ok(error) => error.error,
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    };
    match status {
        401 | 403 => SyncError::Authorization(format!("{status}: {detail}")),
        400 | 404 | 409 | 422 => SyncError::Validation(format!("{status}: {detail}")),
        500..=599 => SyncError::transport_retryable(format!("server error {status}: {detail}")),
        _ => SyncError::Protocol(format!("unexpected status {status}: {detail}")),
    }
}

fn decode_error(what: &str) -> impl FnOnce(notesync_protocol::ProtocolError) -> SyncError + '_ {
    move |e| SyncError::Protocol(format!("failed to decode {what}: {e}"))
}

impl<C: HttpClient> RemoteCollection for HttpRemoteCollection<C> {
    fn fetch_metadata(&self, server_url: &str, user_name: &str) -> SyncResult<CollectionMetadata> {
        let response = self.send(HttpRequest::get(self.user_url(server_url, user_name)))?;

        // The server answers 404 for any user it does not know.
        if response.status == 404 {
            let err = SyncError::Authorization(format!("unknown user: {user_name}"));
            *self.last_error.write() = Some(err.to_string());
            return Err(err);
        }
        let response = self.check(response)?;
        let user = UserResponse::decode(&response.body).map_err(decode_error("user"))?;
        Ok(user.into())
    }

    fn fetch_notes(
        &self,
        principal: &PrincipalInfo,
        since: Option<i64>,
    ) -> SyncResult<Vec<NoteRecord>> {
        let mut url = format!("{}?include_notes=true", principal.notes_ref);
        if let Some(revision) = since {
            url.push_str(&format!("&since={revision}"));
        }
        let response = self.execute(HttpRequest::get(url))?;
        let notes = NotesResponse::decode(&response.body).map_err(decode_error("notes"))?;
        Ok(notes.notes)
    }

    fn apply_update(
        &self,
        principal: &PrincipalInfo,
        expected_revision: Option<i64>,
        operations: &[NoteOperation],
    ) -> SyncResult<i64> {
        let request = NoteChangesRequest::from_operations(expected_revision, operations);
        let response = self.send(HttpRequest::put(&principal.notes_ref, request.encode()?))?;

        if response.status == 409 {
            let reported = ErrorResponse::decode(&response.body)
                .ok()
                .and_then(|e| e.latest_sync_revision);
            if let (Some(expected), Some(actual)) = (expected_revision, reported) {
                let err = SyncError::Conflict {
                    expected: expected - 1,
                    actual,
                };
                *self.last_error.write() = Some(err.to_string());
                return Err(err);
            }
        }
        let response = self.check(response)?;
        let index =
            NoteIndexResponse::decode(&response.body).map_err(decode_error("update response"))?;
        Ok(index.latest_sync_revision)
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request and returns the response.
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        Ok(self.server.handle(&request))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_protocol::{now, ContentVersion, ResourceRef};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestClient {
        responses: Mutex<Vec<Result<HttpResponse, String>>>,
        requests: Mutex<Vec<HttpRequest>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn respond(&self, status: u16, body: Vec<u8>) {
            self.responses.lock().push(Ok(HttpResponse::new(status, body)));
        }

        fn fail(&self, message: &str) {
            self.responses.lock().push(Err(message.to_string()));
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for TestClient {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err("No response set".into());
            }
            responses.remove(0)
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn principal() -> PrincipalInfo {
        PrincipalInfo {
            user_name: "sandy".into(),
            first_name: None,
            last_name: None,
            notes_ref: "https://notes.example.com/api/1.0/sandy/notes".into(),
            current_sync_guid: "collection-1".into(),
        }
    }

    fn user_body(revision: i64) -> Vec<u8> {
        UserResponse {
            user_name: "sandy".into(),
            first_name: Some("Sandy".into()),
            last_name: None,
            notes_ref: ResourceRef::api("https://notes.example.com/api/1.0/sandy/notes"),
            latest_sync_revision: revision,
            current_sync_guid: "collection-1".into(),
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn request_path_and_query() {
        let request = HttpRequest::get("https://host:8080/api/1.0/sandy/notes?since=4");
        assert_eq!(
            request.path_and_query(),
            ("/api/1.0/sandy/notes", Some("since=4"))
        );
        assert_eq!(HttpRequest::get("https://host").path_and_query(), ("/", None));
    }

    #[test]
    fn fetch_metadata_builds_user_url() {
        let remote = HttpRemoteCollection::new(TestClient::new()).with_access_token("secret");
        remote.client().respond(200, user_body(12));

        let metadata = remote
            .fetch_metadata("https://notes.example.com/", "sandy")
            .unwrap();
        assert_eq!(metadata.latest_revision, 12);
        assert_eq!(metadata.principal.first_name.as_deref(), Some("Sandy"));

        let requests = remote.client().requests();
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].url, "https://notes.example.com/api/1.0/sandy");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
    }

    #[test]
    fn user_url_escapes_user_name() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        assert_eq!(
            remote.user_url("https://h", "alice?x"),
            "https://h/api/1.0/alice%3Fx"
        );
        assert_eq!(
            remote.user_url("https://h", "a b/c"),
            "https://h/api/1.0/a%20b%2Fc"
        );
    }

    #[test]
    fn unknown_user_is_authorization_error() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        let body = ErrorResponse::new("unknown user: nobody");
        remote.client().respond(404, body.encode().unwrap());

        let err = remote.fetch_metadata("https://h", "nobody").unwrap_err();
        assert!(matches!(err, SyncError::Authorization(_)));
        assert!(!err.is_retryable());
        assert!(remote.last_error().is_some());
    }

    #[test]
    fn api_version_is_configurable() {
        let remote = HttpRemoteCollection::new(TestClient::new()).with_api_version("2.0");
        assert_eq!(
            remote.user_url("https://h", "u"),
            "https://h/api/2.0/u"
        );
    }

    #[test]
    fn fetch_notes_passes_since() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        let body = NotesResponse {
            latest_sync_revision: 9,
            notes: vec![NoteRecord::new("n1", "One", now())
                .with_content(ContentVersion::DEFAULT, "body")
                .with_revision(9)],
        };
        remote.client().respond(200, body.encode().unwrap());

        let notes = remote.fetch_notes(&principal(), Some(5)).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].guid(), "n1");
        assert_eq!(
            remote.client().requests()[0].url,
            "https://notes.example.com/api/1.0/sandy/notes?include_notes=true&since=5"
        );
    }

    #[test]
    fn apply_update_puts_changes() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        let body = NoteIndexResponse {
            latest_sync_revision: 4,
            notes: Vec::new(),
        };
        remote.client().respond(200, body.encode().unwrap());

        let ops = vec![NoteOperation::delete("gone")];
        assert_eq!(remote.apply_update(&principal(), Some(4), &ops).unwrap(), 4);

        let request = &remote.client().requests()[0];
        assert_eq!(request.method, HttpMethod::Put);
        let sent = NoteChangesRequest::decode(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent.latest_sync_revision, Some(4));
        assert_eq!(sent.into_operations().unwrap(), ops);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(401, b"no"),
            SyncError::Authorization(_)
        ));
        assert!(matches!(
            status_error(403, b"no"),
            SyncError::Authorization(_)
        ));
        assert!(matches!(status_error(404, b""), SyncError::Validation(_)));
        assert!(matches!(status_error(400, b""), SyncError::Validation(_)));
        assert!(matches!(status_error(409, b""), SyncError::Validation(_)));
        assert!(status_error(503, b"").is_retryable());
        assert!(matches!(status_error(302, b""), SyncError::Protocol(_)));
    }

    #[test]
    fn conflict_reports_revisions() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        let body = ErrorResponse {
            error: "revision mismatch".into(),
            latest_sync_revision: Some(7),
        };
        remote.client().respond(409, body.encode().unwrap());

        let err = remote
            .apply_update(&principal(), Some(5), &[NoteOperation::delete("x")])
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Conflict {
                expected: 4,
                actual: 7
            }
        ));
    }

    #[test]
    fn client_failure_is_retryable() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        remote.client().fail("connection refused");

        let err = remote.fetch_metadata("https://h", "u").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(remote.last_error().as_deref(), Some("connection refused"));
    }

    #[test]
    fn unhealthy_client_sends_nothing() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        remote.client().set_healthy(false);
        assert!(!remote.is_connected());

        let err = remote.fetch_metadata("https://h", "u").unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
        assert!(remote.client().requests().is_empty());
    }

    #[test]
    fn malformed_body_is_protocol_error() {
        let remote = HttpRemoteCollection::new(TestClient::new());
        remote.client().respond(200, b"<html>".to_vec());

        let err = remote.fetch_metadata("https://h", "u").unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
    }
}
