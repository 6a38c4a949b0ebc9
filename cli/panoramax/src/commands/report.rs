use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use panoramax_client::PanoramaxClient;
use panoramax_client::types::{ReportIssue, ReportRequest};
use tracing::instrument;

use super::print_json;
use crate::utils::message;

#[derive(Bpaf, Clone, Debug)]
pub struct Report {
    /// Picture the problem is about
    #[bpaf(long, short, argument("ID"))]
    picture: Option<String>,

    /// Sequence the problem is about
    #[bpaf(long, short, argument("ID"))]
    sequence: Option<String>,

    /// Address the moderators can answer to
    #[bpaf(long, argument("EMAIL"))]
    email: Option<String>,

    /// Details for the moderators
    #[bpaf(long, argument("TEXT"))]
    comment: Option<String>,

    /// One of blur_missing, blur_excess, inappropriate, privacy,
    /// picture_low_quality, mislocated, copyright, other
    #[bpaf(positional("ISSUE"))]
    issue: String,
}

impl Report {
    #[instrument(name = "report", skip_all)]
    pub async fn handle(self, client: PanoramaxClient) -> Result<()> {
        let request = self.to_request()?;
        let report = client
            .report(&request)
            .await
            .context("Could not send the report")?;

        message::updated(format!("Reported as '{}'", report.id));
        print_json(&report)
    }

    fn to_request(&self) -> Result<ReportRequest> {
        if self.picture.is_none() && self.sequence.is_none() {
            bail!("A report needs '--picture' or '--sequence'");
        }

        let issue = parse_issue(&self.issue)?;
        let mut request = ReportRequest::new(issue);
        if let Some(picture) = &self.picture {
            request = request.picture(picture);
        }
        if let Some(sequence) = &self.sequence {
            request = request.sequence(sequence);
        }
        if let Some(comment) = &self.comment {
            request = request.comments(comment);
        }
        request.reporter_email = self.email.clone();
        Ok(request)
    }
}

fn parse_issue(issue: &str) -> Result<ReportIssue> {
    match ReportIssue::from(issue.replace('-', "_")) {
        ReportIssue::Unknown(_) => bail!("Unknown issue '{issue}'"),
        known => Ok(known),
    }
}
