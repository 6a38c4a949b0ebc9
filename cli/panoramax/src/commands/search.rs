use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use panoramax_client::{PanoramaxClient, PlaceDistance, PlaceFilter, SearchFilter};
use tracing::instrument;

use super::{LonLat, parse_numbers, print_json, split_list};

#[derive(Bpaf, Clone, Debug, Default)]
pub struct Search {
    /// Only pictures inside this box
    #[bpaf(long, argument("W,S,E,N"))]
    bbox: Option<String>,

    /// Only pictures showing this place
    #[bpaf(long, argument("LON,LAT"))]
    place: Option<LonLat>,

    /// Distance in meters from '--place', a maximum or a range
    #[bpaf(long, argument("MAX|MIN-MAX"))]
    distance: Option<String>,

    /// Tolerated angle in degrees between the picture's direction and '--place'
    #[bpaf(long("fov-tolerance"), argument("DEG"))]
    fov_tolerance: Option<f64>,

    /// Only pictures with these ids
    #[bpaf(long, argument("ID,..."))]
    ids: Option<String>,

    /// Only pictures of these sequences
    #[bpaf(long, argument("ID,..."))]
    collections: Option<String>,

    /// Only pictures captured at this date or in this interval
    #[bpaf(long, argument("DATETIME"))]
    datetime: Option<String>,

    /// Maximum number of pictures
    #[bpaf(long, short, argument("N"))]
    limit: Option<u32>,
}

impl Search {
    #[instrument(name = "search", skip_all)]
    pub async fn handle(self, client: PanoramaxClient) -> Result<()> {
        let filter = self.to_filter()?;
        let pictures = client
            .search(&filter)
            .await
            .context("Could not search pictures")?;
        print_json(&pictures)
    }

    fn to_filter(&self) -> Result<SearchFilter> {
        let mut filter = SearchFilter::new();

        if let Some(bbox) = &self.bbox {
            match parse_numbers(bbox).map_err(anyhow::Error::msg)?.as_slice() {
                [west, south, east, north] => {
                    filter = filter.bbox(*west, *south, *east, *north);
                },
                _ => bail!("'--bbox' expects W,S,E,N, got '{bbox}'"),
            }
        }

        match self.place {
            Some(LonLat { lon, lat }) => {
                let mut place = PlaceFilter::new(lon, lat);
                if let Some(distance) = &self.distance {
                    place = place.distance(parse_distance(distance)?);
                }
                if let Some(tolerance) = self.fov_tolerance {
                    place = place.fov_tolerance(tolerance);
                }
                filter = filter.place(place);
            },
            None if self.distance.is_some() || self.fov_tolerance.is_some() => {
                bail!("'--distance' and '--fov-tolerance' need '--place'")
            },
            None => {},
        }

        if let Some(ids) = &self.ids {
            filter = filter.ids(split_list(ids.clone()));
        }
        if let Some(collections) = &self.collections {
            filter = filter.collections(split_list(collections.clone()));
        }
        if let Some(datetime) = &self.datetime {
            filter = filter.datetime(datetime.as_str());
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }

        Ok(filter)
    }
}

/// `MAX` or `MIN-MAX`, in meters
fn parse_distance(s: &str) -> Result<PlaceDistance> {
    let number = |n: &str| {
        n.trim()
            .parse::<f64>()
            .with_context(|| format!("'{n}' is not a distance"))
    };
    match s.split_once('-') {
        Some((min, max)) => Ok(PlaceDistance::from((number(min)?, number(max)?))),
        None => Ok(PlaceDistance::from(number(s)?)),
    }
}

#[derive(Bpaf, Clone, Debug)]
pub struct Image {
    /// Sequence of the picture, saves a search when known
    #[bpaf(long, short, argument("SEQUENCE"))]
    sequence: Option<String>,

    /// Id of the picture
    #[bpaf(positional("ID"))]
    id: String,
}

impl Image {
    #[instrument(name = "image", skip_all)]
    pub async fn handle(self, client: PanoramaxClient) -> Result<()> {
        let picture = client
            .image_info(&self.id, self.sequence.as_deref())
            .await
            .with_context(|| format!("Could not get picture '{}'", self.id))?;
        print_json(&picture)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_search() {
        assert_eq!(Search::default().to_filter().unwrap(), SearchFilter::new());
    }

    #[test]
    fn place_with_distance_range_and_tolerance() {
        let search = Search {
            place: Some(LonLat {
                lon: 3.7174,
                lat: 51.0543,
            }),
            distance: Some("5-50".to_string()),
            fov_tolerance: Some(30.0),
            limit: Some(10),
            ..Default::default()
        };

        let expected = SearchFilter::new()
            .place(
                PlaceFilter::new(3.7174, 51.0543)
                    .distance((5.0, 50.0))
                    .fov_tolerance(30.0),
            )
            .limit(10);
        assert_eq!(search.to_filter().unwrap(), expected);
    }

    #[test]
    fn bbox_ids_and_collections() {
        let search = Search {
            bbox: Some("3.7,51.0,3.8,51.1".to_string()),
            ids: Some("a,b".to_string()),
            collections: Some("c".to_string()),
            datetime: Some("2023-05-01/..".to_string()),
            ..Default::default()
        };

        let expected = SearchFilter::new()
            .bbox(3.7, 51.0, 3.8, 51.1)
            .ids(["a", "b"])
            .collections(["c"])
            .datetime("2023-05-01/..");
        assert_eq!(search.to_filter().unwrap(), expected);
    }

    #[test]
    fn bbox_needs_four_numbers() {
        let search = Search {
            bbox: Some("3.7,51.0,3.8".to_string()),
            ..Default::default()
        };
        assert!(search.to_filter().is_err());
    }

    #[test]
    fn distance_without_place_is_rejected() {
        let search = Search {
            distance: Some("50".to_string()),
            ..Default::default()
        };
        assert!(search.to_filter().is_err());
    }

    #[test]
    fn distance_forms() {
        assert_eq!(parse_distance("50").unwrap(), PlaceDistance::Max(50.0));
        assert_eq!(parse_distance("5-50").unwrap(), PlaceDistance::Range(5.0, 50.0));
        assert!(parse_distance("far").is_err());
    }
}
