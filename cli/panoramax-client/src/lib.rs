//! Client for the Panoramax street-level imagery API.
//!
//! This crate provides:
//! - An anonymous client for browsing sequences, searching pictures and building viewer links
//! - An authenticated client for creating sequences and uploading pictures
//! - A pluggable [Transport] with an HTTP implementation over reqwest
//! - Mock infrastructure for testing (recording/replay, and a scripted transport behind the `tests` feature)
//!
//! ## Usage
//!
//! ```ignore
//! use futures::TryStreamExt;
//! use panoramax_client::{PanoramaxClient, PanoramaxClientConfig, SearchFilter, PlaceFilter};
//!
//! let client = PanoramaxClient::new(PanoramaxClientConfig::default())?;
//!
//! let pictures = client
//!     .search(&SearchFilter::new().place(PlaceFilter::new(3.7174, 51.0543).distance(50.0)))
//!     .await?;
//!
//! let client = client.login(token);
//! let sequence = client.create_collection(Some("Gent")).await?;
//! let picture = client
//!     .upload(image, &sequence.id, &UploadOptions::default(), None)
//!     .await?;
//! ```

mod client;
mod config;
mod endpoint;
mod error;
mod id;
pub mod mock;
mod paginate;
mod search;
mod tile;
mod transport;
pub mod types;
mod upload;
mod view_link;

// Public exports
pub use client::{AuthenticatedClient, PanoramaxClient};
pub use config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, PanoramaxClientConfig, PanoramaxMockMode};
pub use endpoint::{EndpointBase, normalize_base_url};
pub use error::{DecodeError, HttpError, PanoramaxError, Result, TransportError, ValidationError};
pub use id::{ResourceId, is_valid_id};
pub use paginate::{Page, follow_next_links};
pub use search::{BBox, EncodedSearch, Place, PlaceDistance, PlaceFilter, SearchFilter};
pub use tile::{TileCoordinates, TileDecodeError, TileDecoder};
pub use transport::{
    BearerAuth,
    Credential,
    ReqwestTransport,
    RequestBody,
    Transport,
    TransportRequest,
    TransportResponse,
};
pub use upload::{
    FormPart,
    MultipartForm,
    ProgressObserver,
    UploadImage,
    UploadOptions,
    UploadProgress,
    build_form,
};
pub use view_link::{DEFAULT_ZOOM, Focus, Location, ViewLinkOptions, build_view_link};
