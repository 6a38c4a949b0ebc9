//! The request/response capability the client is built on.
//!
//! [Transport] is small: a request goes in, a response with any
//! status comes out. [ReqwestTransport] implements it over HTTP and
//! [BearerAuth] decorates any transport with a bearer credential.

use std::error::Error as _;
use std::fmt::Debug;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::PanoramaxClientConfig;
use crate::endpoint::EndpointBase;
use crate::error::{DecodeError, HttpError, Result, TransportError, ValidationError};
use crate::upload::{FormPart, MultipartForm, ProgressObserver, progress_chunks};

/// Upper bound for establishing a connection, independent of the request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_USER_AGENT: &str = concat!("panoramax-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// A request handed to a [Transport].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL, or a path starting with `/` when sent through [BearerAuth].
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A response of any status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// URL the request was sent to.
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn status_text(&self) -> String {
        self.status
            .canonical_reason()
            .unwrap_or_default()
            .to_string()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        serde_json::from_slice(&self.body).map_err(|source| DecodeError::Json {
            url: self.url.clone(),
            source,
        })
    }

    /// Turn a non-success response into an [HttpError], discarding the body.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(HttpError {
            status: self.status,
            status_text: self.status_text(),
            body: None,
        })
    }

    /// Turn a non-success response into an [HttpError] that keeps the body.
    pub fn error_for_status_with_body(self) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(HttpError {
            status: self.status,
            status_text: self.status_text(),
            body: Some(self.text()),
        })
    }
}

/// Sends requests to a Panoramax instance.
///
/// Implementations return responses of any status
/// and only fail if the exchange did not complete.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;

    /// Like [Transport::send], reporting how much of the file parts of a
    /// multipart body has been sent.
    fn send_with_progress(
        &self,
        request: TransportRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send {
        (**self).send(request)
    }

    fn send_with_progress(
        &self,
        request: TransportRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> impl Future<Output = Result<TransportResponse>> + Send {
        (**self).send_with_progress(request, observer)
    }
}

// ---------------------------------------------------------------------------
// reqwest
// ---------------------------------------------------------------------------

/// [Transport] over a [reqwest::Client].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &PanoramaxClientConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    async fn execute(
        &self,
        request: TransportRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<TransportResponse> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let parsed = Url::parse(&url).map_err(|source| ValidationError::InvalidUrl {
            url: url.clone(),
            source,
        })?;

        debug!(%method, %url, "sending request");

        let builder = self.client.request(method, parsed).headers(headers);
        let builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(into_reqwest_form(form, observer)?),
        };

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(e))?
            .to_vec();

        debug!(%url, %status, len = body.len(), "received response");

        Ok(TransportResponse {
            url,
            status,
            headers,
            body,
        })
    }

    fn map_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout(self.timeout);
        }
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        TransportError::Network(message)
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.execute(request, None).await
    }

    async fn send_with_progress(
        &self,
        request: TransportRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<TransportResponse> {
        self.execute(request, observer).await
    }
}

/// Stream the file parts of `form` so that `observer` sees the bytes as they are sent.
fn into_reqwest_form(
    form: MultipartForm,
    observer: Option<Arc<dyn ProgressObserver>>,
) -> Result<reqwest::multipart::Form> {
    let mut multipart = reqwest::multipart::Form::new();
    for part in form.into_parts() {
        multipart = match part {
            FormPart::Text { name, value } => multipart.text(name, value),
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let length = bytes.len() as u64;
                let chunks = progress_chunks(bytes, observer.clone()).map(Ok::<_, std::io::Error>);
                let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));
                let file = reqwest::multipart::Part::stream_with_length(body, length)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| ValidationError::InvalidHeader {
                        name: header::CONTENT_TYPE.to_string(),
                        reason: e.to_string(),
                    })?;
                multipart.part(name, file)
            },
        };
    }
    Ok(multipart)
}

/// Build the HTTP client used for all requests to an instance.
fn build_http_client(config: &PanoramaxClientConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.extra_headers {
        let invalid = |reason: String| ValidationError::InvalidHeader {
            name: key.clone(),
            reason,
        };
        headers.insert(
            HeaderName::from_str(key).map_err(|e| invalid(e.to_string()))?,
            HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?,
        );
    }

    debug!(
        base_url = %config.base_url,
        timeout = ?config.timeout,
        extra_headers = config.extra_headers.len(),
        "building HTTP client"
    );

    let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
        .timeout(config.timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| TransportError::Network(e.to_string()).into())
}

// ---------------------------------------------------------------------------
// Bearer authentication
// ---------------------------------------------------------------------------

/// An opaque API token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Decorates a transport with an `Authorization: Bearer` header.
///
/// Paths starting with `/` are resolved against the instance before sending.
/// Requests whose URL is still not absolute are refused before the header
/// is attached. Non-success responses fail with an [HttpError] that keeps the
/// response body.
#[derive(Debug, Clone)]
pub struct BearerAuth<T> {
    inner: T,
    credential: Credential,
    base: EndpointBase,
}

impl<T> BearerAuth<T> {
    pub fn new(inner: T, credential: Credential, base: EndpointBase) -> Self {
        Self {
            inner,
            credential,
            base,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn authorize(&self, mut request: TransportRequest) -> Result<TransportRequest> {
        request.url = self.base.make_absolute(&request.url);
        Url::parse(&request.url).map_err(|source| ValidationError::InvalidUrl {
            url: request.url.clone(),
            source,
        })?;

        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.credential.expose()))
            .map_err(|e| ValidationError::InvalidHeader {
                name: header::AUTHORIZATION.to_string(),
                reason: e.to_string(),
            })?;
        value.set_sensitive(true);
        request.headers.insert(header::AUTHORIZATION, value);
        Ok(request)
    }
}

impl<T: Transport> Transport for BearerAuth<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let request = self.authorize(request)?;
        let response = self.inner.send(request).await?;
        Ok(response.error_for_status_with_body()?)
    }

    async fn send_with_progress(
        &self,
        request: TransportRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<TransportResponse> {
        let request = self.authorize(request)?;
        let response = self.inner.send_with_progress(request, observer).await?;
        Ok(response.error_for_status_with_body()?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use futures::channel::mpsc;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::PanoramaxError;
    use crate::mock::MockTransport;
    use crate::upload::{UploadImage, UploadOptions, UploadProgress, build_form};

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.test";

    fn client_config(url: &str) -> PanoramaxClientConfig {
        PanoramaxClientConfig::with_base_url(url)
    }

    fn base() -> EndpointBase {
        EndpointBase::parse("https://panoramax.example").unwrap()
    }

    #[tokio::test]
    async fn returns_non_success_responses() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/collections/missing/");
            then.status(404).body("gone");
        });

        let transport = ReqwestTransport::new(&client_config(&server.base_url())).unwrap();
        let response = transport
            .send(TransportRequest::get(server.url("/api/collections/missing/")))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.status_text(), "Not Found");
        assert_eq!(response.text(), "gone");
        mock.assert();
    }

    #[tokio::test]
    async fn extra_headers_and_user_agent_set_on_all_requests() {
        let expected_agent = "my-custom-user-agent";
        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("x-panoramax-test".to_string(), "test-value".to_string());

        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.header("x-panoramax-test", "test-value")
                .header("user-agent", expected_agent);
            then.status(200).json_body(json!({"ok": true}));
        });

        let config = PanoramaxClientConfig {
            extra_headers,
            user_agent: Some(expected_agent.to_string()),
            ..client_config(&server.base_url())
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        let response = transport
            .send(TransportRequest::get(server.url("/api/")))
            .await
            .unwrap();

        assert!(response.is_success());
        mock.assert();
    }

    #[tokio::test]
    async fn json_body_is_sent() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/")
                .header("content-type", "application/json")
                .json_body(json!({"title": "Ghent"}));
            then.status(200).json_body(json!({"id": "4c9d5bd2-a48a-4b4e-b2a6-37e4e2b3e1c6"}));
        });

        let transport = ReqwestTransport::new(&client_config(&server.base_url())).unwrap();
        let response = transport
            .send(TransportRequest::post(server.url("/api/collections/")).json(json!({"title": "Ghent"})))
            .await
            .unwrap();

        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["id"], "4c9d5bd2-a48a-4b4e-b2a6-37e4e2b3e1c6");
        mock.assert();
    }

    #[tokio::test]
    async fn timeout_is_reported_as_such() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.any_request();
            then.status(200).delay(Duration::from_millis(500));
        });

        let config = PanoramaxClientConfig {
            timeout: Duration::from_millis(50),
            ..client_config(&server.base_url())
        };
        let transport = ReqwestTransport::new(&config).unwrap();
        let err = transport
            .send(TransportRequest::get(server.url("/api/")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PanoramaxError::Transport(TransportError::Timeout(timeout)) if timeout == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let transport = ReqwestTransport::new(&client_config("http://127.0.0.1:1")).unwrap();
        let err = transport
            .send(TransportRequest::get("http://127.0.0.1:1/api/"))
            .await
            .unwrap_err();
        assert!(matches!(err, PanoramaxError::Transport(TransportError::Network(_))));
    }

    #[tokio::test]
    async fn malformed_request_url_is_rejected() {
        let transport = ReqwestTransport::new(&PanoramaxClientConfig::default()).unwrap();
        let err = transport
            .send(TransportRequest::get("/api/collections/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PanoramaxError::Validation(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn invalid_extra_header_is_rejected() {
        let mut config = PanoramaxClientConfig::default();
        config
            .extra_headers
            .insert("bad header".to_string(), "value".to_string());
        let err = ReqwestTransport::new(&config).unwrap_err();
        assert!(matches!(
            err,
            PanoramaxError::Validation(ValidationError::InvalidHeader { name, .. }) if name == "bad header"
        ));
    }

    #[tokio::test]
    async fn multipart_upload_reports_progress() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/seq/items/")
                .header_exists("content-type");
            then.status(202).json_body(json!({}));
        });

        let picture = vec![7u8; 200_000];
        let form = build_form(
            UploadImage::new("IMG_0001.jpg", picture.clone()),
            &UploadOptions::default(),
        );
        let (sender, mut receiver) = mpsc::unbounded();

        let transport = ReqwestTransport::new(&client_config(&server.base_url())).unwrap();
        let response = transport
            .send_with_progress(
                TransportRequest::post(server.url("/api/collections/seq/items/")).multipart(form),
                Some(Arc::new(sender)),
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::ACCEPTED);
        mock.assert();

        let mut events: Vec<UploadProgress> = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        assert!(!events.is_empty());
        assert_eq!(events.last().unwrap(), &UploadProgress {
            sent: picture.len() as u64,
            total: picture.len() as u64,
        });
    }

    #[tokio::test]
    async fn bearer_auth_adds_header_and_resolves_paths() {
        let inner = Arc::new(MockTransport::new());
        inner.push_json(200, json!({}));
        let transport = BearerAuth::new(inner.clone(), Credential::new(TOKEN), base());

        let request = TransportRequest::get("/api/users/me/collection/").header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("42"),
        );
        transport.send(request).await.unwrap();

        let sent = inner.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://panoramax.example/api/users/me/collection/");
        assert_eq!(
            sent[0].headers.get(header::AUTHORIZATION).unwrap(),
            &format!("Bearer {TOKEN}")
        );
        assert!(sent[0].headers.get(header::AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(sent[0].headers.get("x-request-id").unwrap(), "42");
    }

    #[tokio::test]
    async fn bearer_auth_refuses_scheme_relative_urls() {
        let inner = Arc::new(MockTransport::new());
        inner.push_json(200, json!({}));
        let transport = BearerAuth::new(inner.clone(), Credential::new(TOKEN), base());

        let err = transport
            .send(TransportRequest::get("//evil.example/derivates/hd.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PanoramaxError::Validation(ValidationError::InvalidUrl { ref url, .. })
                if url == "//evil.example/derivates/hd.jpg"
        ));
        assert_eq!(inner.request_count(), 0);
    }

    #[tokio::test]
    async fn bearer_auth_keeps_error_body() {
        let inner = MockTransport::new();
        inner.push_text(400, r#"{"message": "invalid position"}"#);
        let transport = BearerAuth::new(inner, Credential::new(TOKEN), base());

        let err = transport
            .send(TransportRequest::post("https://panoramax.example/api/collections/"))
            .await
            .unwrap_err();

        let PanoramaxError::Http(err) = err else {
            panic!("expected an http error, got {err:?}");
        };
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.as_deref(), Some(r#"{"message": "invalid position"}"#));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let debug = format!("{:?}", Credential::new(TOKEN));
        assert!(!debug.contains(TOKEN));
    }

    #[test]
    fn error_for_status_discards_body() {
        let response = TransportResponse {
            url: "https://panoramax.example/api/".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: b"trace".to_vec(),
        };
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.body, None);
        assert_eq!(err.to_string(), "500: Internal Server Error");
    }
}
