use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use chrono::DateTime;
use indicatif::{ProgressBar, ProgressStyle};
use panoramax_client::types::ImageItem;
use panoramax_client::{
    AuthenticatedClient,
    ProgressObserver,
    Transport,
    UploadImage,
    UploadOptions,
    UploadProgress,
};
use tracing::{debug, instrument};

use super::print_json;
use crate::utils::message;

#[derive(Bpaf, Clone, Debug)]
pub struct Upload {
    /// Latitude replacing the one found in the picture's EXIF tags
    #[bpaf(long, argument("LAT"))]
    lat: Option<f64>,

    /// Longitude replacing the one found in the picture's EXIF tags
    #[bpaf(long, argument("LON"))]
    lon: Option<f64>,

    /// Capture time replacing the one found in the picture's EXIF tags (RFC 3339)
    #[bpaf(long("capture-time"), argument("TIME"))]
    capture_time: Option<String>,

    /// Replace an EXIF tag, for example 'Make=GoPro'
    #[bpaf(long, argument("KEY=VALUE"))]
    exif: Vec<String>,

    /// The picture is already blurred
    #[bpaf(long)]
    blurred: bool,

    /// Position of the picture in the sequence
    #[bpaf(long, argument("N"))]
    position: Option<u32>,

    /// Place the picture after the current last picture of the sequence
    #[bpaf(long)]
    append: bool,

    /// Content type of the file, 'image/jpeg' by default
    #[bpaf(long("content-type"), argument("TYPE"))]
    content_type: Option<String>,

    /// Sequence receiving the picture
    #[bpaf(positional("SEQUENCE"))]
    sequence: String,

    /// Picture to upload
    #[bpaf(positional("FILE"))]
    file: PathBuf,
}

impl Upload {
    #[instrument(name = "upload", skip_all, fields(file = %self.file.display()))]
    pub async fn handle<T: Transport>(self, client: AuthenticatedClient<T>) -> Result<()> {
        let mut options = self.to_options()?;
        if self.append {
            let sequence = client
                .sequence(&self.sequence)
                .await
                .with_context(|| format!("Could not get sequence '{}'", self.sequence))?;
            options = options.position(sequence.next_position());
            debug!(position = ?options.position, "appending to sequence");
        }

        let image = self.read_image().await?;
        let progress = ProgressBarObserver::new(&image);
        let bar = progress.0.clone();

        let result = client
            .upload(image, &self.sequence, &options, Some(Arc::new(progress)))
            .await;
        bar.finish_and_clear();

        let picture: ImageItem = result
            .with_context(|| format!("Could not upload '{}'", self.file.display()))?;

        message::created(format!(
            "Uploaded '{}' as picture '{}'",
            self.file.display(),
            picture.id
        ));
        print_json(&picture)
    }

    fn to_options(&self) -> Result<UploadOptions> {
        let mut options = UploadOptions::new().blurred(self.blurred);

        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => options = options.location(lat, lon),
            (None, None) => {},
            _ => bail!("'--lat' and '--lon' must be given together"),
        }

        match (self.position, self.append) {
            (Some(_), true) => bail!("'--position' and '--append' can not be combined"),
            (Some(position), false) => options = options.position(position),
            _ => {},
        }

        if let Some(capture_time) = &self.capture_time {
            let capture_time = DateTime::parse_from_rfc3339(capture_time)
                .with_context(|| format!("'{capture_time}' is not an RFC 3339 date"))?;
            options = options.capture_time(capture_time);
        }

        for tag in &self.exif {
            let Some((key, value)) = tag.split_once('=') else {
                bail!("'--exif' expects KEY=VALUE, got '{tag}'");
            };
            options = options.exif(key, value);
        }

        Ok(options)
    }

    async fn read_image(&self) -> Result<UploadImage> {
        let bytes = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("Could not read '{}'", self.file.display()))?;

        let mut image = UploadImage::new(file_name(&self.file), bytes);
        if let Some(content_type) = &self.content_type {
            image = image.content_type(content_type);
        }
        Ok(image)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "picture.jpg".to_string())
}

/// Shows upload progress on stderr
struct ProgressBarObserver(ProgressBar);

impl ProgressBarObserver {
    fn new(image: &UploadImage) -> Self {
        let bar = ProgressBar::new(image.bytes.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(image.file_name.clone());
        Self(bar)
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress(&self, progress: UploadProgress) {
        self.0.set_length(progress.total);
        self.0.set_position(progress.sent);
    }
}
