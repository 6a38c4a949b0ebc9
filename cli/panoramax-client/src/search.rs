//! Search filters for the STAC `/search` endpoint.
//!
//! A [SearchFilter] is encoded into query parameters, plus a JSON body when
//! an `intersects` geometry is given (geometries can be arbitrarily large
//! and do not belong in a URL).

use std::fmt::Display;

use serde_json::json;
use url::form_urlencoded;

use crate::error::{PanoramaxError, Result};
use crate::id::ResourceId;

/// Bounding box, four numbers or six when a vertical axis is included.
///
/// Values are sent in the order given, boxes spanning the antimeridian
/// (west > east) are passed through as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BBox {
    /// `[west, south, east, north]`
    Flat([f64; 4]),
    /// `[west, south, bottom, east, north, top]`
    Volume([f64; 6]),
}

impl BBox {
    fn values(&self) -> &[f64] {
        match self {
            BBox::Flat(values) => values,
            BBox::Volume(values) => values,
        }
    }
}

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Place {
    pub lon: f64,
    pub lat: f64,
}

/// Distance range, in meters, between a picture and the searched place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaceDistance {
    /// Encoded as `0-<max>`.
    Max(f64),
    /// Encoded as `<min>-<max>`.
    Range(f64, f64),
}

impl From<f64> for PlaceDistance {
    fn from(max: f64) -> Self {
        PlaceDistance::Max(max)
    }
}

impl From<(f64, f64)> for PlaceDistance {
    fn from((min, max): (f64, f64)) -> Self {
        PlaceDistance::Range(min, max)
    }
}

impl Display for PlaceDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceDistance::Max(max) => write!(f, "0-{max}"),
            PlaceDistance::Range(min, max) => write!(f, "{min}-{max}"),
        }
    }
}

/// Search for pictures looking at a point of interest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceFilter {
    pub position: Place,
    pub distance: Option<PlaceDistance>,
    /// Tolerance, in degrees, on the picture's field of view towards the place.
    pub fov_tolerance: Option<f64>,
}

impl PlaceFilter {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            position: Place { lon, lat },
            distance: None,
            fov_tolerance: None,
        }
    }

    pub fn distance(mut self, distance: impl Into<PlaceDistance>) -> Self {
        self.distance = Some(distance.into());
        self
    }

    pub fn fov_tolerance(mut self, degrees: f64) -> Self {
        self.fov_tolerance = Some(degrees);
        self
    }
}

/// Filter for picture searches.
///
/// `place` and `bbox` can not be combined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub bbox: Option<BBox>,
    pub place: Option<PlaceFilter>,
    /// Picture ids.
    pub ids: Vec<String>,
    /// Sequence ids.
    pub collections: Vec<String>,
    /// A date-time or an RFC 3339 interval, e.g. `2018-02-12T00:00:00Z/..`.
    pub datetime: Option<String>,
    /// A GeoJSON geometry, feature or feature collection.
    pub intersects: Option<serde_json::Value>,
    pub limit: Option<u32>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bbox(mut self, west: f64, south: f64, east: f64, north: f64) -> Self {
        self.bbox = Some(BBox::Flat([west, south, east, north]));
        self
    }

    pub fn place(mut self, place: PlaceFilter) -> Self {
        self.place = Some(place);
        self
    }

    pub fn ids<S: ToString>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.ids = ids.into_iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn collections<S: ToString>(mut self, collections: impl IntoIterator<Item = S>) -> Self {
        self.collections = collections.into_iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn datetime(mut self, datetime: impl Into<String>) -> Self {
        self.datetime = Some(datetime.into());
        self
    }

    pub fn intersects(mut self, geometry: serde_json::Value) -> Self {
        self.intersects = Some(geometry);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Encode the filter into query parameters and an optional JSON body.
    ///
    /// Fails without side effects when `place` and `bbox` are combined
    /// or when any of `ids`/`collections` is not a valid id.
    pub fn encode(&self) -> Result<EncodedSearch> {
        if self.place.is_some() && self.bbox.is_some() {
            return Err(PanoramaxError::ConflictingFilter);
        }

        let mut query = Vec::new();

        if let Some(bbox) = &self.bbox {
            query.push(("bbox", join(bbox.values())));
        }

        if let Some(place) = &self.place {
            query.push((
                "place_position",
                format!("{},{}", place.position.lon, place.position.lat),
            ));
            if let Some(distance) = &place.distance {
                query.push(("place_distance", distance.to_string()));
            }
            if let Some(tolerance) = place.fov_tolerance {
                query.push(("place_fov_tolerance", tolerance.to_string()));
            }
        }

        if !self.ids.is_empty() {
            query.push(("ids", validated_id_list("ids", &self.ids)?));
        }
        if !self.collections.is_empty() {
            query.push((
                "collections",
                validated_id_list("collections", &self.collections)?,
            ));
        }

        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(datetime) = &self.datetime {
            query.push(("datetime", datetime.clone()));
        }

        let body = self
            .intersects
            .as_ref()
            .map(|intersects| json!({ "intersects": intersects }));

        Ok(EncodedSearch {
            query: query
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
            body,
        })
    }
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn validated_id_list(field: &'static str, ids: &[String]) -> Result<String> {
    let ids = ids
        .iter()
        .map(|id| ResourceId::parse(field, id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(join(&ids))
}

/// The wire form of a [SearchFilter].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSearch {
    /// Query parameters, in a stable order.
    pub query: Vec<(String, String)>,
    /// JSON body, present only for `intersects` searches.
    pub body: Option<serde_json::Value>,
}

impl EncodedSearch {
    /// The url-encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }
}
