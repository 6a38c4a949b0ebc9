use anyhow::{Context, Result};
use bpaf::Bpaf;
use panoramax_client::PanoramaxClient;
use tracing::instrument;

use super::print_json;
use crate::utils::message;

#[derive(Bpaf, Clone, Debug)]
pub struct Token {
    /// What the token is for, shown when claiming it
    #[bpaf(positional("DESCRIPTION"))]
    description: String,
}

impl Token {
    #[instrument(name = "token", skip_all)]
    pub async fn handle(self, client: PanoramaxClient) -> Result<()> {
        let token = client
            .generate_token(&self.description)
            .await
            .context("Could not generate a token")?;

        match token.claim_link() {
            Some(link) => message::plain(format!(
                "Open {} in a browser to claim the token before using it.",
                link.href
            )),
            None => message::warning("The instance did not return a link to claim the token."),
        }
        print_json(&token)
    }
}
