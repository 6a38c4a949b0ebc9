//! Test doubles.
//!
//! [MockGuard] records or replays HTTP interactions through an httpmock server
//! when a [PanoramaxMockMode] other than `None` is configured.
//! [MockTransport] replays scripted responses without any network stack and
//! is only available in tests or with the `tests` feature.

use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;

use httpmock::{MockServer, RecordingID};
use tracing::{debug, error};

use crate::config::{PanoramaxClientConfig, PanoramaxMockMode};
use crate::endpoint::EndpointBase;

/// Guard to keep a `MockServer` running until the client is dropped.
#[allow(dead_code)] // https://github.com/rust-lang/rust/issues/122833
pub(crate) enum MockGuard {
    Record(MockRecorder),
    Replay {
        server: MockServer,
        /// Origin of the instance the recording was made against
        upstream: String,
    },
}

impl MockGuard {
    pub(crate) fn new(config: &PanoramaxClientConfig, base: &EndpointBase) -> Option<Self> {
        let upstream = base.origin();
        match &config.mock_mode {
            PanoramaxMockMode::None => None,
            PanoramaxMockMode::Record(path) => {
                let server = MockServer::start();
                server.forward_to(&upstream, |rule| {
                    rule.filter(|when| {
                        when.any_request();
                    });
                });
                let recording = server.record(|rule| {
                    rule.filter(|when| {
                        when.any_request();
                    });
                });

                debug!(?path, server = server.base_url(), "mock server recording");
                Some(MockGuard::Record(MockRecorder {
                    path: path.to_path_buf(),
                    upstream,
                    server,
                    recording,
                }))
            },
            PanoramaxMockMode::Replay(path) => {
                let server = MockServer::start();
                server.playback(path);
                debug!(?path, server = server.base_url(), "mock server replaying");

                Some(MockGuard::Replay { server, upstream })
            },
        }
    }

    fn server(&self) -> &MockServer {
        match self {
            MockGuard::Record(recorder) => &recorder.server,
            MockGuard::Replay { server, .. } => server,
        }
    }

    fn upstream(&self) -> &str {
        match self {
            MockGuard::Record(recorder) => &recorder.upstream,
            MockGuard::Replay { upstream, .. } => upstream,
        }
    }

    /// Base URL requests should be sent to instead of the instance.
    ///
    /// Keeps the path of `base` so that instances below a path prefix
    /// are recorded and replayed at the same paths.
    pub(crate) fn url(&self, base: &EndpointBase) -> String {
        format!("{}{}", self.server().base_url(), base.path())
    }

    /// Point an absolute link on the instance at the mock server instead.
    ///
    /// Links to any other host are returned unchanged.
    pub(crate) fn rebase(&self, href: &str) -> String {
        match href.strip_prefix(self.upstream()) {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '?']) => {
                format!("{}{rest}", self.server().base_url())
            },
            _ => href.to_string(),
        }
    }
}

impl Debug for MockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            MockGuard::Record(_) => "MockGuard::Record",
            MockGuard::Replay { .. } => "MockGuard::Replay",
        };
        write!(f, "{mode} url={} upstream={}", self.server().base_url(), self.upstream())
    }
}

/// In addition to keeping a `MockServer` running, also write any recorded
/// requests to a file when dropped.
pub(crate) struct MockRecorder {
    path: PathBuf,
    upstream: String,
    server: MockServer,
    recording: RecordingID,
}

impl Drop for MockRecorder {
    fn drop(&mut self) {
        let Some(file_name) = self.path.file_name().and_then(|name| name.to_str()) else {
            error!(path = ?self.path, "mock recording path has no unicode file name");
            return;
        };
        // `record_save` appends a timestamp, so we rename after write.
        // The name has to be unique, otherwise parallel tests race each other.
        let tempfile = match self
            .server
            .record_save(&self.recording, format!("httpmock_{file_name}"))
        {
            Ok(tempfile) => tempfile,
            Err(err) => {
                error!(%err, "failed to save mock recording");
                return;
            },
        };
        // `rename` fails across file systems, fall back to a copy
        let moved = fs::rename(&tempfile, &self.path).or_else(|_| {
            fs::copy(&tempfile, &self.path)?;
            fs::remove_file(&tempfile)
        });
        if let Err(err) = moved {
            error!(
                %err,
                src = %tempfile.display(),
                dest = %self.path.display(),
                "failed to rename recorded mock file"
            );
            return;
        }
        debug!(path = ?self.path, "saved mock recording");
    }
}

#[cfg(any(test, feature = "tests"))]
pub use scripted::MockTransport;

#[cfg(any(test, feature = "tests"))]
mod scripted {
    use std::collections::VecDeque;
    use std::future::{Future, ready};
    use std::sync::{Arc, Mutex};

    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;

    use crate::error::{Result, TransportError};
    use crate::transport::{RequestBody, Transport, TransportRequest, TransportResponse};
    use crate::upload::{FormPart, ProgressObserver, progress_chunks};

    #[derive(Debug)]
    enum Scripted {
        Response { status: StatusCode, body: Vec<u8> },
        Failure(TransportError),
    }

    /// A [Transport] that records requests and replays queued responses in order.
    ///
    /// Requests beyond the queued responses fail with a network error.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        requests: Mutex<Vec<TransportRequest>>,
        responses: Mutex<VecDeque<Scripted>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_bytes(&self, status: u16, body: Vec<u8>) {
            let status = StatusCode::from_u16(status).expect("valid status code");
            self.responses
                .lock()
                .expect("lock poisoned")
                .push_back(Scripted::Response { status, body });
        }

        pub fn push_json(&self, status: u16, body: serde_json::Value) {
            self.push_bytes(status, body.to_string().into_bytes());
        }

        pub fn push_text(&self, status: u16, body: &str) {
            self.push_bytes(status, body.as_bytes().to_vec());
        }

        pub fn push_error(&self, error: TransportError) {
            self.responses
                .lock()
                .expect("lock poisoned")
                .push_back(Scripted::Failure(error));
        }

        /// All requests sent so far, in order.
        pub fn requests(&self) -> Vec<TransportRequest> {
            self.requests.lock().expect("lock poisoned").clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().expect("lock poisoned").len()
        }

        fn respond(
            &self,
            request: TransportRequest,
            observer: Option<Arc<dyn ProgressObserver>>,
        ) -> Result<TransportResponse> {
            if let RequestBody::Multipart(form) = &request.body {
                for part in form.parts() {
                    if let FormPart::File { bytes, .. } = part {
                        progress_chunks(bytes.clone(), observer.clone()).for_each(drop);
                    }
                }
            }

            let url = request.url.clone();
            self.requests.lock().expect("lock poisoned").push(request);

            let next = self.responses.lock().expect("lock poisoned").pop_front();
            match next {
                Some(Scripted::Response { status, body }) => Ok(TransportResponse {
                    url,
                    status,
                    headers: HeaderMap::new(),
                    body,
                }),
                Some(Scripted::Failure(error)) => Err(error.into()),
                None => Err(TransportError::Network(format!("no response queued for {url}")).into()),
            }
        }
    }

    impl Transport for MockTransport {
        fn send(
            &self,
            request: TransportRequest,
        ) -> impl Future<Output = Result<TransportResponse>> + Send {
            ready(self.respond(request, None))
        }

        fn send_with_progress(
            &self,
            request: TransportRequest,
            observer: Option<Arc<dyn ProgressObserver>>,
        ) -> impl Future<Output = Result<TransportResponse>> + Send {
            ready(self.respond(request, observer))
        }
    }
}

/// Canned response documents.
#[cfg(any(test, feature = "tests"))]
pub mod fixtures {
    use serde_json::{Value, json};

    pub const SEQUENCE_ID: &str = "4c9d5bd2-a48a-4b4e-b2a6-37e4e2b3e1c6";
    pub const PICTURE_ID: &str = "0a1b2c3d-0000-4000-8000-000000000001";

    /// A picture feature whose assets live below `asset_prefix`.
    pub fn image_item_json(id: &str, asset_prefix: &str) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "collection": SEQUENCE_ID,
            "geometry": { "type": "Point", "coordinates": [3.7, 51.05] },
            "properties": {
                "datetime": "2023-05-01T10:00:00+02:00",
                "view:azimuth": 271.5,
                "geovisio:status": "ready",
                "geovisio:producer": "pietervdvn",
                "license": "CC-BY-SA-4.0",
                "exif": {
                    "Exif.Image.Make": "GoPro",
                    "Xmp.GPano.ProjectionType": "equirectangular"
                }
            },
            "assets": {
                "hd": { "href": format!("{asset_prefix}/hd.jpg"), "type": "image/jpeg", "roles": ["data"] },
                "sd": { "href": format!("{asset_prefix}/sd.jpg"), "type": "image/jpeg", "roles": ["visual"] },
                "thumb": { "href": format!("{asset_prefix}/thumb.jpg"), "type": "image/jpeg", "roles": ["thumbnail"] }
            },
            "providers": [{ "name": "pietervdvn", "roles": ["producer"] }],
            "links": []
        })
    }

    pub fn sequence_json(id: &str, title: &str, count: u64) -> Value {
        json!({
            "type": "Collection",
            "id": id,
            "title": title,
            "extent": {
                "spatial": { "bbox": [[3.7, 51.0, 3.8, 51.1]] },
                "temporal": { "interval": [["2023-05-01T08:00:00+00:00", "2023-05-01T09:00:00+00:00"]] }
            },
            "stats:items": { "count": count },
            "links": []
        })
    }

    /// One page of `/collections`, advertising `next` when given.
    pub fn collections_page(collections: Vec<Value>, next: Option<&str>) -> Value {
        let mut links = vec![json!({ "href": "/api/collections", "rel": "self" })];
        if let Some(next) = next {
            links.push(json!({ "href": next, "rel": "next", "type": "application/json" }));
        }
        json!({ "collections": collections, "links": links })
    }

    pub fn item_collection(features: Vec<Value>) -> Value {
        json!({ "type": "FeatureCollection", "features": features, "links": [] })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn rebase_moves_instance_links_onto_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let config = PanoramaxClientConfig {
            mock_mode: PanoramaxMockMode::Record(dir.path().join("listing.yaml")),
            ..PanoramaxClientConfig::with_base_url("https://panoramax.example")
        };
        let base = EndpointBase::parse(&config.base_url).unwrap();
        let guard = MockGuard::new(&config, &base).unwrap();
        let server_url = guard.server().base_url();

        assert_eq!(guard.url(&base), format!("{server_url}/api/"));
        assert_eq!(
            guard.rebase("https://panoramax.example/api/collections?page=2"),
            format!("{server_url}/api/collections?page=2")
        );
        assert_eq!(
            guard.rebase("https://panoramax.example.org/api/collections"),
            "https://panoramax.example.org/api/collections"
        );
        assert_eq!(
            guard.rebase("https://cdn.example/derivates/hd.jpg"),
            "https://cdn.example/derivates/hd.jpg"
        );
    }
}
