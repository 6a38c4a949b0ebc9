//! Panoramax response records.
//!
//! Typed views of the STAC documents returned by the service.
//! Fields the client does not rely on are optional so that federated
//! instances running slightly different server versions still decode.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// A STAC/OGC link.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Find the first link with relation `rel`.
pub(crate) fn find_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a Link> {
    links.iter().find(|link| link.rel == rel)
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Extent {
    #[serde(default)]
    pub spatial: SpatialExtent,
    #[serde(default)]
    pub temporal: TemporalExtent,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SpatialExtent {
    /// One or more `[west, south, east, north]` boxes.
    #[serde(default)]
    pub bbox: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TemporalExtent {
    /// One or more `[start, end]` intervals, open ends are `None`.
    #[serde(default)]
    pub interval: Vec<Vec<Option<DateTime<Utc>>>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ItemStats {
    pub count: u64,
}

/// A sequence of pictures, served as a STAC collection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sequence {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extent: Extent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "stats:items", default)]
    pub stats: ItemStats,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
}

impl Sequence {
    /// The 1-based position a picture appended to this sequence would take.
    pub fn next_position(&self) -> u32 {
        next_position(self.stats.count)
    }
}

fn next_position(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX).saturating_add(1)
}

/// One page of the `/collections` listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct CollectionsPage {
    #[serde(default)]
    pub collections: Vec<Sequence>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// A sequence as linked from the `/users/me/collection` catalog.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SequenceLink {
    pub href: String,
    pub rel: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Extent>,
    #[serde(rename = "stats:items", default)]
    pub stats: ItemStats,
}

impl SequenceLink {
    /// The 1-based position a picture appended to this sequence would take.
    pub fn next_position(&self) -> u32 {
        next_position(self.stats.count)
    }
}

/// The catalog returned by `/users/me/collection`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserCatalog {
    #[serde(default)]
    pub links: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Pictures
// ---------------------------------------------------------------------------

/// Processing status of an uploaded picture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum PictureStatus {
    Ready,
    Broken,
    Preparing,
    WaitingForProcess,
    Other(String),
}

impl From<String> for PictureStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ready" => PictureStatus::Ready,
            "broken" => PictureStatus::Broken,
            "preparing" => PictureStatus::Preparing,
            "waiting-for-process" => PictureStatus::WaitingForProcess,
            _ => PictureStatus::Other(value),
        }
    }
}

impl From<PictureStatus> for String {
    fn from(value: PictureStatus) -> Self {
        value.to_string()
    }
}

impl Display for PictureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PictureStatus::Ready => write!(f, "ready"),
            PictureStatus::Broken => write!(f, "broken"),
            PictureStatus::Preparing => write!(f, "preparing"),
            PictureStatus::WaitingForProcess => write!(f, "waiting-for-process"),
            PictureStatus::Other(other) => write!(f, "{other}"),
        }
    }
}

/// A link to one rendition of a picture.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssetLink {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageAssets {
    /// High definition.
    pub hd: AssetLink,
    /// Standard definition.
    pub sd: AssetLink,
    pub thumb: AssetLink,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PointGeometry {
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Utc>>,
    /// Compass heading in degrees.
    #[serde(rename = "view:azimuth", default, skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<f64>,
    #[serde(rename = "geovisio:status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PictureStatus>,
    #[serde(rename = "geovisio:producer", default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(rename = "geovisio:license", default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub exif: BTreeMap<String, serde_json::Value>,
}

/// A geolocated picture, served as a STAC item.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageItem {
    pub id: String,
    /// Id of the sequence the picture belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub geometry: Option<PointGeometry>,
    pub properties: ImageProperties,
    pub assets: ImageAssets,
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl ImageItem {
    /// `(lon, lat)` of the picture, if it is geolocated.
    pub fn location(&self) -> Option<(f64, f64)> {
        self.geometry
            .as_ref()
            .map(|geometry| (geometry.coordinates[0], geometry.coordinates[1]))
    }

    /// Whether the picture is an equirectangular panorama.
    pub fn is_panorama(&self) -> bool {
        self.properties
            .exif
            .get("Xmp.GPano.ProjectionType")
            .and_then(|projection| projection.as_str())
            == Some("equirectangular")
    }
}

/// A page of pictures as returned by `/search` and `/collections/{id}/items`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemCollection {
    #[serde(default)]
    pub features: Vec<ImageItem>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Properties of a picture point in a map tile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PictureProperties {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Capture timestamp, as served by the tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Ids of the sequences the picture belongs to.
    #[serde(default)]
    pub sequences: Vec<String>,
    /// `flat` or `equirectangular`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Camera make and model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A picture feature decoded from a vector map tile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PicturePoint {
    pub geometry: PointGeometry,
    pub properties: PictureProperties,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// A freshly generated API token.
///
/// The token is unusable until a human claims it through [Token::claim_link].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Token {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Token {
    pub fn claim_link(&self) -> Option<&Link> {
        find_link(&self.links, "claim")
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Kind of problem reported about a picture or a sequence.
///
/// Issues added to the service later decode as [ReportIssue::Unknown].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ReportIssue {
    BlurMissing,
    BlurExcess,
    Inappropriate,
    Privacy,
    PictureLowQuality,
    Mislocated,
    Copyright,
    Other,
    Unknown(String),
}

impl From<String> for ReportIssue {
    fn from(value: String) -> Self {
        match value.as_str() {
            "blur_missing" => ReportIssue::BlurMissing,
            "blur_excess" => ReportIssue::BlurExcess,
            "inappropriate" => ReportIssue::Inappropriate,
            "privacy" => ReportIssue::Privacy,
            "picture_low_quality" => ReportIssue::PictureLowQuality,
            "mislocated" => ReportIssue::Mislocated,
            "copyright" => ReportIssue::Copyright,
            "other" => ReportIssue::Other,
            _ => ReportIssue::Unknown(value),
        }
    }
}

impl From<ReportIssue> for String {
    fn from(value: ReportIssue) -> Self {
        value.to_string()
    }
}

impl Display for ReportIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportIssue::BlurMissing => write!(f, "blur_missing"),
            ReportIssue::BlurExcess => write!(f, "blur_excess"),
            ReportIssue::Inappropriate => write!(f, "inappropriate"),
            ReportIssue::Privacy => write!(f, "privacy"),
            ReportIssue::PictureLowQuality => write!(f, "picture_low_quality"),
            ReportIssue::Mislocated => write!(f, "mislocated"),
            ReportIssue::Copyright => write!(f, "copyright"),
            ReportIssue::Other => write!(f, "other"),
            ReportIssue::Unknown(other) => write!(f, "{other}"),
        }
    }
}

/// A problem report about a picture, a sequence or both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRequest {
    pub issue: ReportIssue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_comments: Option<String>,
}

impl ReportRequest {
    pub fn new(issue: ReportIssue) -> Self {
        Self {
            issue,
            picture_id: None,
            sequence_id: None,
            reporter_email: None,
            reporter_comments: None,
        }
    }

    pub fn picture(mut self, picture_id: impl Into<String>) -> Self {
        self.picture_id = Some(picture_id.into());
        self
    }

    pub fn sequence(mut self, sequence_id: impl Into<String>) -> Self {
        self.sequence_id = Some(sequence_id.into());
        self
    }

    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.reporter_comments = Some(comments.into());
        self
    }
}

/// A report as stored by the service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Report {
    pub id: String,
    pub issue: ReportIssue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_opened: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::mock::fixtures;

    #[test]
    fn decode_image_item() {
        let item: ImageItem = serde_json::from_value(fixtures::image_item_json(
            "0a1b2c3d-0000-4000-8000-000000000001",
            "/derivates/x",
        ))
        .unwrap();

        assert_eq!(item.location(), Some((3.7, 51.05)));
        assert_eq!(item.properties.status, Some(PictureStatus::Ready));
        assert_eq!(item.properties.azimuth, Some(271.5));
        assert!(item.is_panorama());
        assert_eq!(
            item.properties.datetime.unwrap().to_rfc3339(),
            "2023-05-01T08:00:00+00:00"
        );
        assert_eq!(item.assets.sd.href, "/derivates/x/sd.jpg");
    }

    #[test]
    fn report_with_unknown_issue_decodes() {
        let report: Report = serde_json::from_value(json!({
            "id": "r-1",
            "issue": "duplicate",
            "status": "open",
            "picture_id": "0a1b2c3d-0000-4000-8000-000000000001"
        }))
        .unwrap();
        assert_eq!(report.issue, ReportIssue::Unknown("duplicate".to_string()));
        assert_eq!(serde_json::to_value(&report.issue).unwrap(), json!("duplicate"));

        let issue: ReportIssue = serde_json::from_value(json!("picture_low_quality")).unwrap();
        assert_eq!(issue, ReportIssue::PictureLowQuality);
        assert_eq!(serde_json::to_value(ReportIssue::Other).unwrap(), json!("other"));
    }

    #[test]
    fn unknown_status_is_kept() {
        let status: PictureStatus = serde_json::from_value(json!("hidden")).unwrap();
        assert_eq!(status, PictureStatus::Other("hidden".to_string()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("hidden"));
        let status: PictureStatus = serde_json::from_value(json!("waiting-for-process")).unwrap();
        assert_eq!(status, PictureStatus::WaitingForProcess);
    }

    #[test]
    fn decode_sequence_with_open_interval() {
        let sequence: Sequence = serde_json::from_value(json!({
            "type": "Collection",
            "id": "4c9d5bd2-a48a-4b4e-b2a6-37e4e2b3e1c6",
            "title": "Gent",
            "created": "2023-05-01T10:00:00+00:00",
            "extent": {
                "spatial": { "bbox": [[3.7, 51.0, 3.8, 51.1]] },
                "temporal": { "interval": [["2023-05-01T10:00:00+00:00", null]] }
            },
            "license": "CC-BY-SA-4.0",
            "providers": [{ "name": "pietervdvn", "roles": ["producer"] }],
            "stats:items": { "count": 41 },
            "links": []
        }))
        .unwrap();

        assert_eq!(sequence.stats.count, 41);
        assert_eq!(sequence.next_position(), 42);
        assert_eq!(sequence.extent.temporal.interval[0][1], None);
    }

    #[test]
    fn token_claim_link() {
        let token: Token = serde_json::from_value(json!({
            "id": "token-id",
            "description": "my upload script",
            "generated_at": "2024-01-01T00:00:00+00:00",
            "jwt_token": "eyJ...",
            "links": [{ "href": "https://panoramax.example/api/auth/tokens/token-id/claim", "rel": "claim", "type": "application/json" }]
        }))
        .unwrap();

        assert_eq!(
            token.claim_link().map(|link| link.href.as_str()),
            Some("https://panoramax.example/api/auth/tokens/token-id/claim")
        );
    }
}
