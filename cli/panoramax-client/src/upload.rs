//! Picture upload payloads and progress reporting.
//!
//! The multipart payload is assembled as a transport-agnostic [MultipartForm],
//! so the field layout can be checked without a network stack.
//! Transports turn the form into a request body and report how much of the
//! picture has been handed to the network through a [ProgressObserver].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use futures::channel::mpsc::UnboundedSender;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

const EXIF_OVERRIDE_PREFIX: &str = "override_Exif.Image.";
const PICTURE_FIELD: &str = "picture";

/// Size of the chunks the picture is streamed in.
pub(crate) const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// A picture file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadImage {
    /// A JPEG picture named `file_name`.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            bytes: bytes.into(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Optional metadata sent alongside a picture.
///
/// Overrides take precedence over the metadata embedded in the picture.
/// Unset or zero values are not sent at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    /// Whether the picture was already blurred by the uploader.
    pub is_blurred: bool,
    /// 1-based position in the sequence.
    /// When unset the service appends the picture.
    pub position: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub capture_time: Option<DateTime<FixedOffset>>,
    /// EXIF `Image` tags to override, keyed by tag name (e.g. `Artist`).
    pub exif_override: BTreeMap<String, String>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blurred(mut self, is_blurred: bool) -> Self {
        self.is_blurred = is_blurred;
        self
    }

    pub fn position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn capture_time(mut self, capture_time: DateTime<FixedOffset>) -> Self {
        self.capture_time = Some(capture_time);
        self
    }

    pub fn exif(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.exif_override.insert(key.into(), value.into());
        self
    }
}

/// A single multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// An ordered multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, image: UploadImage) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: image.file_name,
            content_type: image.content_type,
            bytes: image.bytes,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<FormPart> {
        self.parts
    }

    /// Value of the first text field called `name`.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Number of file bytes in the form.
    pub fn file_len(&self) -> u64 {
        self.parts
            .iter()
            .map(|part| match part {
                FormPart::File { bytes, .. } => bytes.len() as u64,
                FormPart::Text { .. } => 0,
            })
            .sum()
    }
}

/// Assemble the multipart payload for a picture upload.
///
/// Fields are emitted in a fixed order with the picture last:
/// `isBlurred`, `position`, `override_latitude`, `override_longitude`,
/// `override_capture_time`, one `override_Exif.Image.<key>` per EXIF override,
/// then `picture`.
pub fn build_form(image: UploadImage, options: &UploadOptions) -> MultipartForm {
    let mut form = MultipartForm::new().text("isBlurred", options.is_blurred.to_string());

    if let Some(position) = options.position.filter(|position| *position != 0) {
        form = form.text("position", position.to_string());
    }
    if let Some(latitude) = options.latitude.filter(|latitude| *latitude != 0.0) {
        form = form.text("override_latitude", latitude.to_string());
    }
    if let Some(longitude) = options.longitude.filter(|longitude| *longitude != 0.0) {
        form = form.text("override_longitude", longitude.to_string());
    }
    if let Some(capture_time) = &options.capture_time {
        form = form.text(
            "override_capture_time",
            capture_time.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        );
    }
    for (key, value) in &options.exif_override {
        if value.is_empty() {
            continue;
        }
        form = form.text(format!("{EXIF_OVERRIDE_PREFIX}{key}"), value);
    }

    form.file(PICTURE_FIELD, image)
}

/// Upload progress of the picture payload, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Fraction of the payload sent, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.sent as f64 / self.total as f64
    }
}

/// Receives progress events while a picture is being sent.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: UploadProgress);
}

impl ProgressObserver for UnboundedSender<UploadProgress> {
    fn on_progress(&self, progress: UploadProgress) {
        // the receiving end may have stopped listening, which does not affect the upload
        let _ = self.unbounded_send(progress);
    }
}

/// Split `bytes` into chunks, notifying `observer` as each chunk is consumed.
///
/// Events are monotonic and the last one has `sent == total`.
pub(crate) fn progress_chunks(
    bytes: Vec<u8>,
    observer: Option<Arc<dyn ProgressObserver>>,
) -> impl Iterator<Item = Vec<u8>> + Send + Sync + 'static {
    let total = bytes.len() as u64;
    let chunks: Vec<Vec<u8>> = bytes.chunks(PROGRESS_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0;
    chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(observer) = &observer {
            observer.on_progress(UploadProgress { sent, total });
        }
        chunk
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use futures::StreamExt;
    use futures::channel::mpsc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn image() -> UploadImage {
        UploadImage::new("IMG_0001.jpg", vec![0xff, 0xd8, 0xff, 0xe0])
    }

    fn field_names(form: &MultipartForm) -> Vec<&str> {
        form.parts().iter().map(FormPart::name).collect()
    }

    #[test]
    fn minimal_form_has_blur_flag_and_picture() {
        let form = build_form(image(), &UploadOptions::default());
        assert_eq!(field_names(&form), vec!["isBlurred", "picture"]);
        assert_eq!(form.text_value("isBlurred"), Some("false"));
        assert_eq!(form.file_len(), 4);
    }

    #[test]
    fn all_fields_in_order_with_picture_last() {
        let capture_time = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 5, 1, 10, 0, 0)
            .unwrap();
        let options = UploadOptions::new()
            .blurred(true)
            .position(4)
            .location(51.05, 3.7)
            .capture_time(capture_time)
            .exif("Artist", "A")
            .exif("Copyright", "CC-BY-SA");

        let form = build_form(image(), &options);

        assert_eq!(field_names(&form), vec![
            "isBlurred",
            "position",
            "override_latitude",
            "override_longitude",
            "override_capture_time",
            "override_Exif.Image.Artist",
            "override_Exif.Image.Copyright",
            "picture",
        ]);
        assert_eq!(form.text_value("isBlurred"), Some("true"));
        assert_eq!(form.text_value("position"), Some("4"));
        assert_eq!(form.text_value("override_latitude"), Some("51.05"));
        assert_eq!(form.text_value("override_longitude"), Some("3.7"));
        assert_eq!(
            form.text_value("override_capture_time"),
            Some("2023-05-01T10:00:00+02:00")
        );
        assert_eq!(form.text_value("override_Exif.Image.Artist"), Some("A"));
    }

    #[test]
    fn exif_override_absent_when_not_set() {
        let form = build_form(image(), &UploadOptions::default());
        assert!(
            form.parts()
                .iter()
                .all(|part| !part.name().starts_with(EXIF_OVERRIDE_PREFIX))
        );
    }

    #[test]
    fn falsy_overrides_are_omitted() {
        let options = UploadOptions::new()
            .position(0)
            .location(0.0, 0.0)
            .exif("Artist", "");
        let form = build_form(image(), &options);
        assert_eq!(field_names(&form), vec!["isBlurred", "picture"]);
    }

    #[test]
    fn picture_part_keeps_file_metadata() {
        let form = build_form(
            image().content_type("image/webp"),
            &UploadOptions::default(),
        );
        let Some(FormPart::File {
            file_name,
            content_type,
            ..
        }) = form.parts().last()
        else {
            panic!("picture should be the last part");
        };
        assert_eq!(file_name, "IMG_0001.jpg");
        assert_eq!(content_type, "image/webp");
    }

    #[tokio::test]
    async fn progress_events_are_monotonic_and_complete() {
        let (sender, receiver) = mpsc::unbounded();
        let bytes = vec![0u8; PROGRESS_CHUNK_SIZE * 2 + 10];

        let sent: Vec<u8> = progress_chunks(bytes, Some(Arc::new(sender)))
            .flatten()
            .collect();
        assert_eq!(sent.len(), PROGRESS_CHUNK_SIZE * 2 + 10);

        let events: Vec<UploadProgress> = receiver.collect().await;
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|pair| pair[0].sent < pair[1].sent));
        let last = events.last().unwrap();
        assert_eq!(last.sent, last.total);
        assert_eq!(last.fraction(), 1.0);
    }

    #[test]
    fn dropped_receiver_does_not_interrupt_chunks() {
        let (sender, receiver) = mpsc::unbounded();
        drop(receiver);
        let chunks: Vec<Vec<u8>> = progress_chunks(vec![1, 2, 3], Some(Arc::new(sender))).collect();
        assert_eq!(chunks, vec![vec![1, 2, 3]]);
    }
}
