use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use config::{Config as HierarchicalConfig, Environment};
use panoramax_client::{
    DEFAULT_BASE_URL,
    DEFAULT_TIMEOUT,
    PanoramaxClientConfig,
    PanoramaxMockMode,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the directory holding the configuration file
const PANORAMAX_DIR_NAME: &str = "panoramax";
const PANORAMAX_CONFIG_DIR_VAR: &str = "PANORAMAX_CONFIG_DIR";
const PANORAMAX_ENV_PREFIX: &str = "PANORAMAX_";
pub const PANORAMAX_CONFIG_FILE: &str = "panoramax.toml";
/// Record all HTTP exchanges to this file, for integration tests
const PANORAMAX_MOCK_RECORD_VAR: &str = "_PANORAMAX_MOCK_RECORD";
/// Replay HTTP exchanges recorded with `$_PANORAMAX_MOCK_RECORD`
const PANORAMAX_MOCK_REPLAY_VAR: &str = "_PANORAMAX_MOCK_REPLAY";

/// Settings of the `panoramax` command.
///
/// Read from built-in defaults, then `panoramax.toml`,
/// then `PANORAMAX_*` environment variables.
/// Command line flags are applied last, by the command handler.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Base URL of the Panoramax instance
    pub url: String,
    /// Token used by commands acting on behalf of a user
    pub token: Option<String>,
    /// Seconds after which a request is abandoned
    pub timeout_secs: u64,
    /// Overrides the default user agent
    pub user_agent: Option<String>,
}

impl Config {
    /// Creates a [Config] from the environment and the config file
    pub fn parse() -> Result<Config> {
        let config_file = config_dir().map(|dir| dir.join(PANORAMAX_CONFIG_FILE));
        let envs = env::vars().filter_map(|(k, v)| {
            k.strip_prefix(PANORAMAX_ENV_PREFIX)
                .filter(|k| *k != "CONFIG_DIR")
                .map(|k| (k.to_owned(), v))
        });
        Self::from_sources(config_file.as_deref(), envs.collect())
    }

    fn from_sources(config_file: Option<&Path>, envs: HashMap<String, String>) -> Result<Config> {
        let mut builder = HierarchicalConfig::builder()
            .set_default("url", DEFAULT_BASE_URL)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT.as_secs())?;

        if let Some(config_file) = config_file {
            debug!(path = %config_file.display(), "reading config file");
            builder = builder.add_source(
                config::File::from(config_file)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let final_config = builder
            .add_source(Environment::default().source(Some(envs)).try_parsing(true))
            .build()?;

        final_config
            .try_deserialize()
            .context("Could not parse config")
    }

    /// Client settings derived from this configuration
    pub fn client_config(&self) -> PanoramaxClientConfig {
        PanoramaxClientConfig {
            base_url: self.url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            ..Default::default()
        }
    }
}

/// Mock mode selected through `$_PANORAMAX_MOCK_RECORD` or `$_PANORAMAX_MOCK_REPLAY`
pub fn mock_mode_from_env() -> Result<PanoramaxMockMode> {
    mock_mode(
        env::var_os(PANORAMAX_MOCK_RECORD_VAR),
        env::var_os(PANORAMAX_MOCK_REPLAY_VAR),
    )
}

fn mock_mode(record: Option<OsString>, replay: Option<OsString>) -> Result<PanoramaxMockMode> {
    match (record, replay) {
        (None, None) => Ok(PanoramaxMockMode::None),
        (Some(path), None) => {
            debug!(?path, "recording HTTP exchanges");
            Ok(PanoramaxMockMode::Record(path.into()))
        },
        (None, Some(path)) => {
            let path = PathBuf::from(path);
            if !path.exists() {
                bail!("path to mock recording doesn't exist: {}", path.display());
            }
            debug!(?path, "replaying HTTP exchanges");
            Ok(PanoramaxMockMode::Replay(path))
        },
        (Some(_), Some(_)) => bail!(
            "'${PANORAMAX_MOCK_RECORD_VAR}' and '${PANORAMAX_MOCK_REPLAY_VAR}' can not be set together"
        ),
    }
}

/// `$PANORAMAX_CONFIG_DIR` if set, the user's config directory otherwise
fn config_dir() -> Option<PathBuf> {
    match env::var(PANORAMAX_CONFIG_DIR_VAR) {
        Ok(dir) => {
            debug!("`${PANORAMAX_CONFIG_DIR_VAR}` set: {dir}");
            Some(dir.into())
        },
        Err(_) => dirs::config_dir().map(|dir| dir.join(PANORAMAX_DIR_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_without_file_or_env() {
        let config = Config::from_sources(None, HashMap::new()).unwrap();
        assert_eq!(config, Config {
            url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 10,
            user_agent: None,
        });
    }

    #[test]
    fn missing_config_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            Config::from_sources(Some(&dir.path().join(PANORAMAX_CONFIG_FILE)), HashMap::new())
                .unwrap();
        assert_eq!(config.url, DEFAULT_BASE_URL);
    }

    #[test]
    fn file_overrides_defaults_and_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PANORAMAX_CONFIG_FILE);
        fs::write(
            &path,
            "url = \"https://panoramax.ign.fr/\"\ntoken = \"from-file\"\ntimeout_secs = 30\n",
        )
        .unwrap();

        let envs = HashMap::from([
            ("TOKEN".to_string(), "from-env".to_string()),
            ("USER_AGENT".to_string(), "my-uploader/1.0".to_string()),
        ]);
        let config = Config::from_sources(Some(&path), envs).unwrap();

        assert_eq!(config, Config {
            url: "https://panoramax.ign.fr/".to_string(),
            token: Some("from-env".to_string()),
            timeout_secs: 30,
            user_agent: Some("my-uploader/1.0".to_string()),
        });
    }

    #[test]
    fn timeout_from_env_is_parsed() {
        let envs = HashMap::from([("TIMEOUT_SECS".to_string(), "3".to_string())]);
        let config = Config::from_sources(None, envs).unwrap();
        assert_eq!(config.client_config().timeout, Duration::from_secs(3));
    }

    #[test]
    fn mock_mode_selection() {
        assert_eq!(mock_mode(None, None).unwrap(), PanoramaxMockMode::None);
        assert_eq!(
            mock_mode(Some("exchange.yaml".into()), None).unwrap(),
            PanoramaxMockMode::Record("exchange.yaml".into())
        );
        assert!(mock_mode(None, Some("/nonexistent/exchange.yaml".into())).is_err());
        assert!(mock_mode(Some("a.yaml".into()), Some("b.yaml".into())).is_err());

        let recording = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            mock_mode(None, Some(recording.path().into())).unwrap(),
            PanoramaxMockMode::Replay(recording.path().to_path_buf())
        );
    }

    #[test]
    fn invalid_timeout_is_an_error() {
        let envs = HashMap::from([("TIMEOUT_SECS".to_string(), "soon".to_string())]);
        assert!(Config::from_sources(None, envs).is_err());
    }
}
