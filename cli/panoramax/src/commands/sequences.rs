use anyhow::{Context, Result};
use bpaf::Bpaf;
use futures::{StreamExt, TryStreamExt};
use panoramax_client::types::Sequence;
use panoramax_client::{AuthenticatedClient, PanoramaxClient};
use tracing::instrument;

use super::print_json;
use crate::utils::message;

/// Sequences are listed lazily, pages are only requested while more are needed.
#[derive(Bpaf, Clone, Debug)]
pub struct Sequences {
    /// Stop after this many sequences
    #[bpaf(long, short, argument("N"))]
    limit: Option<usize>,
}

impl Sequences {
    #[instrument(name = "sequences", skip_all)]
    pub async fn handle(self, client: PanoramaxClient) -> Result<()> {
        let sequences = client.sequences();
        let sequences: Vec<Sequence> = match self.limit {
            Some(limit) => sequences.take(limit).try_collect().await,
            None => sequences.try_collect().await,
        }
        .context("Could not list sequences")?;

        print_json(&sequences)
    }
}

#[derive(Bpaf, Clone, Debug)]
pub struct MySequences {}

impl MySequences {
    #[instrument(name = "my-sequences", skip_all)]
    pub async fn handle(self, client: AuthenticatedClient) -> Result<()> {
        let sequences = client
            .my_sequences()
            .await
            .context("Could not list your sequences")?;
        print_json(&sequences)
    }
}

#[derive(Bpaf, Clone, Debug)]
pub struct CreateSequence {
    /// Title of the new sequence
    #[bpaf(positional("TITLE"))]
    title: Option<String>,
}

impl CreateSequence {
    #[instrument(name = "create-sequence", skip_all)]
    pub async fn handle(self, client: AuthenticatedClient) -> Result<()> {
        let sequence = client
            .create_collection(self.title.as_deref())
            .await
            .context("Could not create sequence")?;

        message::created(format!("Created sequence '{}'", sequence.id));
        print_json(&sequence)
    }
}
