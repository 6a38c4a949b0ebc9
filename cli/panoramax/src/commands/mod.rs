mod report;
mod search;
mod sequences;
mod token;
mod upload;
mod view_link;

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use panoramax_client::{AuthenticatedClient, PanoramaxClient, PanoramaxClientConfig};
use serde::Serialize;
use tracing::debug;

use crate::config::{Config, PANORAMAX_CONFIG_FILE, mock_mode_from_env};

static PANORAMAX_DESCRIPTION: &str = "Browse, search and upload street-level pictures on a Panoramax instance.";

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, version, descr(PANORAMAX_DESCRIPTION))]
pub struct PanoramaxCli(#[bpaf(external(panoramax_args))] pub PanoramaxArgs);

/// Main panoramax args parser
///
/// To parse the full command line, use [`PanoramaxCli`] through [`panoramax_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)]
pub struct PanoramaxArgs {
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    /// Base URL of the Panoramax instance
    #[bpaf(long, argument("URL"))]
    pub url: Option<String>,

    /// Token for commands acting on behalf of a user
    #[bpaf(long, argument("TOKEN"))]
    pub token: Option<String>,

    #[bpaf(external(commands))]
    command: Commands,
}

#[derive(Debug, Bpaf, Clone)]
enum Commands {
    /// List the sequences of the instance
    #[bpaf(command)]
    Sequences(#[bpaf(external(sequences::sequences))] sequences::Sequences),

    /// Search pictures by area, place, id or date
    #[bpaf(command)]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Show the metadata of one picture
    #[bpaf(command)]
    Image(#[bpaf(external(search::image))] search::Image),

    /// Print a link that opens the viewer on a picture or a location
    #[bpaf(command("view-link"))]
    ViewLink(#[bpaf(external(view_link::view_link))] view_link::ViewLink),

    /// Generate an API token to be claimed in the browser
    #[bpaf(command)]
    Token(#[bpaf(external(token::token))] token::Token),

    /// Report a problem with a picture or a sequence
    #[bpaf(command)]
    Report(#[bpaf(external(report::report))] report::Report),

    /// List the sequences you uploaded
    #[bpaf(command("my-sequences"))]
    MySequences(#[bpaf(external(sequences::my_sequences))] sequences::MySequences),

    /// Create an empty sequence
    #[bpaf(command("create-sequence"))]
    CreateSequence(#[bpaf(external(sequences::create_sequence))] sequences::CreateSequence),

    /// Upload a picture into a sequence
    #[bpaf(command)]
    Upload(#[bpaf(external(upload::upload))] upload::Upload),
}

impl PanoramaxArgs {
    /// Apply command line overrides and run the selected command
    pub async fn handle(self, mut config: Config) -> Result<()> {
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(token) = self.token {
            config.token = Some(token);
        }
        debug!(url = %config.url, authenticated = config.token.is_some(), "running command");

        let client_config = PanoramaxClientConfig {
            mock_mode: mock_mode_from_env()?,
            ..config.client_config()
        };
        let client = PanoramaxClient::new(client_config)
            .with_context(|| format!("Could not connect to '{}'", config.url))?;

        match self.command {
            Commands::Sequences(args) => args.handle(client).await,
            Commands::Search(args) => args.handle(client).await,
            Commands::Image(args) => args.handle(client).await,
            Commands::ViewLink(args) => args.handle(client),
            Commands::Token(args) => args.handle(client).await,
            Commands::Report(args) => args.handle(client).await,
            Commands::MySequences(args) => args.handle(login(client, &config)?).await,
            Commands::CreateSequence(args) => args.handle(login(client, &config)?).await,
            Commands::Upload(args) => args.handle(login(client, &config)?).await,
        }
    }
}

fn login(client: PanoramaxClient, config: &Config) -> Result<AuthenticatedClient> {
    match config.token.as_deref() {
        Some(token) if !token.is_empty() => Ok(client.login(token)),
        _ => bail!(
            "This command needs a token. Pass '--token', set '$PANORAMAX_TOKEN' \
             or add 'token' to {PANORAMAX_CONFIG_FILE}. \
             Run 'panoramax token <description>' to generate one."
        ),
    }
}

/// Write a value to stdout as pretty printed JSON
fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Could not serialize output")?;
    println!("{json}");
    Ok(())
}

/// A `LON,LAT` pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl FromStr for LonLat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_numbers(s)?.as_slice() {
            [lon, lat] => Ok(LonLat {
                lon: *lon,
                lat: *lat,
            }),
            _ => Err(format!("expected LON,LAT, got '{s}'")),
        }
    }
}

/// Parse a comma separated list of numbers
fn parse_numbers(s: &str) -> Result<Vec<f64>, String> {
    s.split(',')
        .map(|n| {
            n.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", n.trim()))
        })
        .collect()
}

/// Split a comma separated list, dropping empty entries
fn split_list(s: String) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> PanoramaxArgs {
        panoramax_cli()
            .run_inner(args)
            .map(|PanoramaxCli(args)| args)
            .unwrap_or_else(|e| panic!("failed to parse {args:?}: {e:?}"))
    }

    #[test]
    fn global_flags_and_command() {
        let args = parse(&["-vv", "--url", "https://panoramax.ign.fr", "sequences"]);
        assert!(matches!(args.verbosity, Verbosity::Verbose(2)));
        assert_eq!(args.url.as_deref(), Some("https://panoramax.ign.fr"));
        assert!(matches!(args.command, Commands::Sequences(_)));
    }

    #[test]
    fn quiet_flag() {
        let args = parse(&["-q", "my-sequences"]);
        assert!(matches!(args.verbosity, Verbosity::Quiet));
        assert!(matches!(args.command, Commands::MySequences(_)));
    }

    #[test]
    fn missing_command_is_an_error() {
        assert!(panoramax_cli().run_inner(&["--url", "https://x.example"]).is_err());
    }

    #[test]
    fn login_requires_a_token() {
        let config = Config {
            url: "https://panoramax.example".to_string(),
            token: None,
            timeout_secs: 10,
            user_agent: None,
        };
        let client = PanoramaxClient::new(config.client_config()).unwrap();
        let err = login(client, &config).unwrap_err();
        assert!(err.to_string().contains("needs a token"));

        let config = Config {
            token: Some("jwt".to_string()),
            ..config
        };
        let client = PanoramaxClient::new(config.client_config()).unwrap();
        assert!(login(client, &config).is_ok());
    }

    #[test]
    fn lon_lat_parsing() {
        assert_eq!("3.7174, 51.0543".parse::<LonLat>().unwrap(), LonLat {
            lon: 3.7174,
            lat: 51.0543
        });
        assert!("3.7".parse::<LonLat>().is_err());
        assert!("east,51".parse::<LonLat>().is_err());
    }

    #[test]
    fn list_splitting_drops_empty_entries() {
        assert_eq!(split_list("a, b,,c,".to_string()), vec!["a", "b", "c"]);
    }
}
