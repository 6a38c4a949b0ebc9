//! Browser links into the Panoramax viewer.

use std::fmt::Display;
use std::str::FromStr;

use crate::endpoint::EndpointBase;
use crate::error::ValidationError;
use crate::id::ResourceId;

pub const DEFAULT_ZOOM: u8 = 15;

/// What the viewer shows in its main panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Pic,
    Map,
}

impl Display for Focus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Focus::Pic => write!(f, "pic"),
            Focus::Map => write!(f, "map"),
        }
    }
}

impl FromStr for Focus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pic" => Ok(Focus::Pic),
            "map" => Ok(Focus::Map),
            other => Err(format!("unknown focus '{other}', expected 'pic' or 'map'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewLinkOptions {
    pub image_id: Option<String>,
    /// Map center.
    pub location: Option<Location>,
    /// Map zoom, [DEFAULT_ZOOM] when unset.
    pub zoom: Option<u8>,
    /// Defaults to the picture if an image is given, to the map otherwise.
    pub focus: Option<Focus>,
}

impl ViewLinkOptions {
    pub fn image(image_id: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            ..Default::default()
        }
    }

    pub fn at(lon: f64, lat: f64) -> Self {
        Self {
            location: Some(Location { lon, lat }),
            ..Default::default()
        }
    }

    pub fn location(mut self, lon: f64, lat: f64) -> Self {
        self.location = Some(Location { lon, lat });
        self
    }

    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn focus(mut self, focus: Focus) -> Self {
        self.focus = Some(focus);
        self
    }
}

/// Build `https://<host>/#pic=<id>&map=<zoom>/<lat>/<lon>&focus=<pic|map>`.
pub fn build_view_link(
    base: &EndpointBase,
    options: &ViewLinkOptions,
) -> Result<String, ValidationError> {
    let image_id = options
        .image_id
        .as_deref()
        .map(|id| ResourceId::parse("image id", id))
        .transpose()?;
    if image_id.is_none() && options.location.is_none() {
        return Err(ValidationError::EmptyViewLink);
    }

    let mut fragment = Vec::new();
    let mut focus = options.focus;
    if let Some(image_id) = &image_id {
        focus.get_or_insert(Focus::Pic);
        fragment.push(format!("pic={image_id}"));
    }
    if let Some(Location { lon, lat }) = options.location {
        focus.get_or_insert(Focus::Map);
        let zoom = options.zoom.unwrap_or(DEFAULT_ZOOM);
        fragment.push(format!("map={zoom}/{lat}/{lon}"));
    }
    if let Some(focus) = focus {
        fragment.push(format!("focus={focus}"));
    }

    Ok(format!("https://{}/#{}", base.host(), fragment.join("&")))
}
