//! Authenticated sessions against one cluster endpoint.
//!
//! A [`Session`] is created by posting credentials to the session resource.
//! The response sets a session cookie (kept by the client's cookie store) and
//! an `isicsrf` cookie whose value must be echoed in the `X-CSRF-Token` header
//! of every later request, together with a `referer` equal to the endpoint
//! URI.
//!
//! ```text
//! open(endpoint, creds) ──POST /session/1/session──► 200/201 + Set-Cookie
//!        │
//!        └─► Session { csrf, referer } ──► every request carries both
//! ```

use std::fmt;
use std::future::Future;

use reqwest::header::REFERER;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{Error, Result};

/// Management API port.
pub const DEFAULT_PORT: u16 = 8080;

/// Cookie carrying the anti-forgery token.
pub const CSRF_COOKIE: &str = "isicsrf";

/// Header the anti-forgery token is echoed in.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const SESSION_PATH: &str = "/session/1/session";

/// URI scheme used to reach the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// TLS (the cluster default).
    #[default]
    Https,
    /// Plain HTTP, for lab proxies and tests.
    Http,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Https => write!(f, "https"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Base URI of one management endpoint, e.g. `https://10.0.0.5:8080`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    uri: String,
}

impl Endpoint {
    /// Builds the endpoint for `host` on `port`.
    #[must_use]
    pub fn new(scheme: Scheme, host: &str, port: u16) -> Self {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_owned()
        };
        Self {
            uri: format!("{scheme}://{host}:{port}"),
        }
    }

    /// Uses an explicit base URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let parsed = url::Url::parse(uri)
            .map_err(|e| Error::validation(format!("invalid endpoint '{uri}': {e}")))?;
        if parsed.host_str().is_none() {
            return Err(Error::validation(format!("endpoint '{uri}' has no host")));
        }
        Ok(Self {
            uri: uri.trim_end_matches('/').to_owned(),
        })
    }

    /// The base URI without trailing slash.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Absolute URL of a resource path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.uri)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Status codes an endpoint accepts as success.
///
/// This is an allow-list, not a range: several endpoints reject 2xx codes
/// outside their list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessCodes(&'static [u16]);

impl SuccessCodes {
    /// Reads, creates and session establishment.
    pub const OK_OR_CREATED: Self = Self(&[200, 201]);
    /// Snapshot lock deletion.
    pub const OK_OR_NO_CONTENT: Self = Self(&[200, 204]);
    /// Open-file close and changelist deletion.
    pub const NO_CONTENT: Self = Self(&[204]);

    /// Whether `status` counts as success.
    #[must_use]
    pub fn accepts(self, status: u16) -> bool {
        self.0.contains(&status)
    }
}

/// Kind of call, deciding which error a rejected status becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Query,
    Create,
    Delete,
    Submit,
    Poll,
}

impl Action {
    fn rejected(self, url: String, status: u16) -> Error {
        match self {
            Self::Query => Error::Query { url, status },
            Self::Create => Error::Create { url, status },
            Self::Delete => Error::Delete { url, status },
            Self::Submit => Error::Submit { url, status },
            Self::Poll => Error::Poll { url, status },
        }
    }
}

/// An authenticated session bound to one endpoint.
pub struct Session {
    endpoint: Endpoint,
    http: reqwest::Client,
    username: String,
    csrf_token: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("has_csrf_token", &self.csrf_token.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Authenticates against `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] unless the session resource answers exactly
    /// 200 or 201.
    pub async fn open(endpoint: Endpoint, credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .cookie_store(true)
            .build()?;

        debug!(endpoint = %endpoint, user = %credentials.username(), "opening session");

        let body = json!({
            "username": credentials.username(),
            "password": credentials.password(),
            "services": ["platform"],
        });
        let response = http
            .post(endpoint.url(SESSION_PATH))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Auth {
                endpoint: endpoint.uri().to_owned(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if !SuccessCodes::OK_OR_CREATED.accepts(status) {
            warn!(endpoint = %endpoint, user = %credentials.username(), status, "session refused");
            return Err(Error::Auth {
                endpoint: endpoint.uri().to_owned(),
                reason: format!("status {status}; check user name, password, or address"),
            });
        }

        let csrf_token = response
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().to_owned());
        if csrf_token.is_none() {
            warn!(endpoint = %endpoint, "session response carried no {CSRF_COOKIE} cookie");
        }

        info!(endpoint = %endpoint, user = %credentials.username(), "session established");
        Ok(Self {
            endpoint,
            http,
            username: credentials.username().to_owned(),
            csrf_token,
        })
    }

    /// The endpoint this session is bound to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The authenticated account.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The anti-forgery token, if the cluster issued one.
    #[must_use]
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(REFERER, self.endpoint.uri());
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    async fn dispatch(
        &self,
        builder: RequestBuilder,
        method: &Method,
        url: String,
        action: Action,
        codes: SuccessCodes,
    ) -> Result<(String, Vec<u8>)> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        if !codes.accepts(status) {
            info!(%method, %url, user = %self.username, status, "request unsuccessful");
            return Err(action.rejected(url, status));
        }
        info!(%method, %url, user = %self.username, status, "request successful");
        let body = response.bytes().await?;
        Ok((url, body.to_vec()))
    }

    /// GET `path` and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        action: Action,
        codes: SuccessCodes,
    ) -> Result<T> {
        let url = self.endpoint.url(path);
        let builder = self.request(Method::GET, &url);
        let (url, body) = self
            .dispatch(builder, &Method::GET, url, action, codes)
            .await?;
        decode(&url, &body)
    }

    /// POST a JSON body to `path` and decode the JSON reply.
    pub(crate) async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        action: Action,
        codes: SuccessCodes,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint.url(path);
        let builder = self.request(Method::POST, &url).json(body);
        let (url, body) = self
            .dispatch(builder, &Method::POST, url, action, codes)
            .await?;
        decode(&url, &body)
    }

    /// DELETE `path`, ignoring any body.
    pub(crate) async fn delete(&self, path: &str, codes: SuccessCodes) -> Result<()> {
        let url = self.endpoint.url(path);
        let builder = self.request(Method::DELETE, &url);
        self.dispatch(builder, &Method::DELETE, url, Action::Delete, codes)
            .await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::Decode {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

/// Opens sessions by host name or address.
pub trait SessionOpener {
    /// Opens a fresh session to `host`.
    fn open(&self, host: &str) -> impl Future<Output = Result<Session>>;
}

/// Production [`SessionOpener`]: fixed scheme and port plus a credential
/// source.
pub struct Connector {
    scheme: Scheme,
    port: u16,
    credentials: Box<dyn CredentialProvider>,
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Connector {
    /// Creates a connector.
    pub fn new(scheme: Scheme, port: u16, credentials: impl CredentialProvider + 'static) -> Self {
        Self {
            scheme,
            port,
            credentials: Box::new(credentials),
        }
    }

    /// The endpoint a host maps to.
    #[must_use]
    pub fn endpoint_for(&self, host: &str) -> Endpoint {
        Endpoint::new(self.scheme, host, self.port)
    }
}

impl SessionOpener for Connector {
    async fn open(&self, host: &str) -> Result<Session> {
        let endpoint = self.endpoint_for(host);
        let credentials = self
            .credentials
            .credentials(endpoint.uri())?
            .ok_or_else(|| Error::Auth {
                endpoint: endpoint.uri().to_owned(),
                reason: "no credentials available".to_owned(),
            })?;
        Session::open(endpoint, &credentials).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use httpmock::prelude::*;
    use test_case::test_case;

    use super::*;

    /// Mocks a successful session resource issuing CSRF token `tok-1`.
    pub(crate) async fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(POST).path(SESSION_PATH);
                then.status(201)
                    .header("Set-Cookie", "isisessid=sess-1; Path=/")
                    .header("Set-Cookie", "isicsrf=tok-1; Path=/")
                    .json_body(json!({"services": ["platform"], "username": "admin"}));
            })
            .await
    }

    pub(crate) async fn open_session(server: &MockServer) -> Session {
        let endpoint = Endpoint::from_uri(&server.base_url()).expect("endpoint");
        Session::open(endpoint, &Credentials::new("admin", "pw"))
            .await
            .expect("session")
    }

    #[test_case(Scheme::Https, "10.0.0.5", 8080, "https://10.0.0.5:8080" ; "ipv4")]
    #[test_case(Scheme::Http, "node1.lab", 9000, "http://node1.lab:9000" ; "dns name")]
    #[test_case(Scheme::Https, "fd00::5", 8080, "https://[fd00::5]:8080" ; "ipv6 bracketed")]
    fn endpoint_uri(scheme: Scheme, host: &str, port: u16, expected: &str) {
        assert_eq!(Endpoint::new(scheme, host, port).uri(), expected);
    }

    #[test]
    fn endpoint_from_uri_trims_trailing_slash() {
        let endpoint = Endpoint::from_uri("http://127.0.0.1:5000/").expect("valid");
        assert_eq!(endpoint.url("/x"), "http://127.0.0.1:5000/x");
        assert!(Endpoint::from_uri("not a uri").is_err());
    }

    #[test_case(SuccessCodes::OK_OR_CREATED, 200, true)]
    #[test_case(SuccessCodes::OK_OR_CREATED, 201, true)]
    #[test_case(SuccessCodes::OK_OR_CREATED, 202, false ; "other 2xx rejected")]
    #[test_case(SuccessCodes::OK_OR_CREATED, 204, false)]
    #[test_case(SuccessCodes::OK_OR_NO_CONTENT, 204, true)]
    #[test_case(SuccessCodes::OK_OR_NO_CONTENT, 201, false)]
    #[test_case(SuccessCodes::NO_CONTENT, 200, false)]
    fn success_codes_are_an_allow_list(codes: SuccessCodes, status: u16, accepted: bool) {
        assert_eq!(codes.accepts(status), accepted);
    }

    #[tokio::test]
    async fn open_posts_credentials_and_captures_csrf() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(SESSION_PATH)
                    .json_body(json!({
                        "username": "admin",
                        "password": "pw",
                        "services": ["platform"],
                    }));
                then.status(200)
                    .header("Set-Cookie", "isisessid=sess-1; Path=/")
                    .header("Set-Cookie", "isicsrf=tok-1; Path=/")
                    .json_body(json!({}));
            })
            .await;

        let session = open_session(&server).await;
        login.assert_async().await;
        assert_eq!(session.csrf_token(), Some("tok-1"));
        assert_eq!(session.username(), "admin");
        assert_eq!(session.endpoint().uri(), server.base_url());
    }

    #[tokio::test]
    async fn later_requests_carry_csrf_referer_and_cookie() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let base = server.base_url();
        let probe = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/platform/1/probe")
                    .header(CSRF_HEADER, "tok-1")
                    .header("referer", base.as_str())
                    .cookie_exists("isisessid");
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let session = open_session(&server).await;
        let body: serde_json::Value = session
            .get("/platform/1/probe", Action::Query, SuccessCodes::OK_OR_CREATED)
            .await
            .expect("probe");
        probe.assert_async().await;
        assert_eq!(body["ok"], true);
    }

    #[test_case(202 ; "accepted is not success")]
    #[test_case(401 ; "unauthorized")]
    #[test_case(500 ; "server error")]
    #[tokio::test]
    async fn open_rejects_anything_but_200_or_201(status: u16) {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(SESSION_PATH);
                then.status(status);
            })
            .await;

        let endpoint = Endpoint::from_uri(&server.base_url()).expect("endpoint");
        let err = Session::open(endpoint, &Credentials::new("admin", "bad"))
            .await
            .expect_err("must fail");
        assert!(matches!(&err, Error::Auth { endpoint, .. } if endpoint == &server.base_url()));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn rejected_status_maps_to_action_error() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/platform/1/thing/3");
                then.status(200);
            })
            .await;

        let session = open_session(&server).await;
        let err = session
            .delete("/platform/1/thing/3", SuccessCodes::NO_CONTENT)
            .await
            .expect_err("200 is not in the allow-list");
        assert!(matches!(err, Error::Delete { status: 200, .. }));
    }

    #[tokio::test]
    async fn connector_without_credentials_fails_as_auth() {
        struct Nothing;
        impl CredentialProvider for Nothing {
            fn credentials(&self, _endpoint: &str) -> Result<Option<Credentials>> {
                Ok(None)
            }
        }

        let connector = Connector::new(Scheme::Http, 1, Nothing);
        let err = connector.open("127.0.0.1").await.expect_err("no creds");
        assert!(matches!(err, Error::Auth { .. }));
    }
}
