use anyhow::{Context, Result};
use bpaf::Bpaf;
use panoramax_client::{Focus, Location, PanoramaxClient, ViewLinkOptions};

use super::LonLat;

#[derive(Bpaf, Clone, Debug, Default)]
pub struct ViewLink {
    /// Picture to show
    #[bpaf(long, short, argument("ID"))]
    image: Option<String>,

    /// Map center
    #[bpaf(long, argument("LON,LAT"))]
    at: Option<LonLat>,

    /// Map zoom level
    #[bpaf(long, short, argument("Z"))]
    zoom: Option<u8>,

    /// Main panel of the viewer, 'pic' or 'map'
    #[bpaf(long, argument("FOCUS"))]
    focus: Option<Focus>,
}

impl ViewLink {
    pub fn handle(self, client: PanoramaxClient) -> Result<()> {
        let link = client
            .view_link(&self.to_options())
            .context("Could not build a viewer link")?;
        println!("{link}");
        Ok(())
    }

    fn to_options(&self) -> ViewLinkOptions {
        ViewLinkOptions {
            image_id: self.image.clone(),
            location: self.at.map(|LonLat { lon, lat }| Location { lon, lat }),
            zoom: self.zoom,
            focus: self.focus,
        }
    }
}
