//! Configuration types for client construction.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Public instance used when no base url is configured.
pub const DEFAULT_BASE_URL: &str = "https://panoramax.openstreetmap.fr/";

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for client construction.
#[derive(Debug, Clone)]
pub struct PanoramaxClientConfig {
    /// Base URL of the Panoramax instance, with or without the `api/` suffix.
    pub base_url: String,
    /// Time after which an in-flight request is abandoned.
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Mock mode for testing.
    pub mock_mode: PanoramaxMockMode,
}

impl Default for PanoramaxClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            mock_mode: PanoramaxMockMode::None,
        }
    }
}

impl PanoramaxClientConfig {
    /// Default configuration pointing at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Mock recording/replay mode for integration testing.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum PanoramaxMockMode {
    /// Use a real server without any mock recording or replaying.
    #[default]
    None,
    /// Proxy via a mock server and record interactions to a path.
    Record(PathBuf),
    /// Replay interactions from a path using a mock server.
    Replay(PathBuf),
}
