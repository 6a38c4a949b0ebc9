//! Anonymous and authenticated clients for a Panoramax instance.

use std::fmt::Debug;
use std::sync::Arc;

use futures::stream::Stream;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};
use url::form_urlencoded;

use crate::config::PanoramaxClientConfig;
use crate::endpoint::EndpointBase;
use crate::error::{DecodeError, PanoramaxError, Result};
use crate::id::ResourceId;
use crate::mock::MockGuard;
use crate::paginate::{Page, follow_next_links};
use crate::search::SearchFilter;
use crate::tile::{TileCoordinates, TileDecoder};
use crate::transport::{BearerAuth, Credential, ReqwestTransport, Transport, TransportRequest};
use crate::types::{
    CollectionsPage,
    ImageItem,
    ItemCollection,
    Link,
    PicturePoint,
    Report,
    ReportRequest,
    Sequence,
    SequenceLink,
    Token,
    UserCatalog,
    find_link,
};
use crate::upload::{ProgressObserver, UploadImage, UploadOptions, build_form};
use crate::view_link::{ViewLinkOptions, build_view_link};

/// A client for the read-only operations of a Panoramax instance.
///
/// [PanoramaxClient::login] upgrades it to an [AuthenticatedClient].
pub struct PanoramaxClient<T = ReqwestTransport> {
    transport: T,
    base: EndpointBase,

    mock_guard: Option<Arc<MockGuard>>,
}

impl<T> Debug for PanoramaxClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanoramaxClient")
            .field("base_url", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl PanoramaxClient<ReqwestTransport> {
    /// Create a client over HTTP from configuration.
    ///
    /// Fails if the base url is malformed, before any request is made.
    pub fn new(config: PanoramaxClientConfig) -> Result<Self> {
        let base = EndpointBase::parse(&config.base_url)?;

        // create a mock server if configured
        let mock_guard = MockGuard::new(&config, &base);
        let base = match mock_guard {
            Some(ref mock) => EndpointBase::parse(&mock.url(&base))?,
            None => base,
        };

        let transport = ReqwestTransport::new(&config)?;
        Ok(Self {
            transport,
            base,
            mock_guard: mock_guard.map(Arc::new),
        })
    }
}

impl<T: Transport> PanoramaxClient<T> {
    /// Create a client for `base_url` sending requests through `transport`.
    pub fn with_transport(base_url: &str, transport: T) -> Result<Self> {
        Ok(Self {
            transport,
            base: EndpointBase::parse(base_url)?,
            mock_guard: None,
        })
    }

    /// The normalized API root, ending in `api/`.
    pub fn base(&self) -> &EndpointBase {
        &self.base
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Use `token` for all further requests.
    pub fn login(self, token: impl Into<String>) -> AuthenticatedClient<T> {
        let transport = BearerAuth::new(self.transport, Credential::new(token), self.base.clone());
        AuthenticatedClient {
            client: PanoramaxClient {
                transport,
                base: self.base,
                mock_guard: self.mock_guard,
            },
        }
    }

    async fn send_json<R: DeserializeOwned>(&self, request: TransportRequest) -> Result<R> {
        let response = self.transport.send(request).await?.error_for_status()?;
        Ok(response.json()?)
    }

    async fn get_json<R: DeserializeOwned>(&self, url: String) -> Result<R> {
        self.send_json(TransportRequest::get(url)).await
    }

    fn absolute_assets(&self, mut item: ImageItem) -> ImageItem {
        self.base.make_asset_absolute(&mut item.assets.hd);
        self.base.make_asset_absolute(&mut item.assets.sd);
        self.base.make_asset_absolute(&mut item.assets.thumb);
        item
    }

    /// Absolute URL of the `next` link, on the mock server when one is active.
    fn next_page_url(&self, links: &[Link]) -> Option<String> {
        let href = self.base.make_absolute(&find_link(links, "next")?.href);
        Some(match &self.mock_guard {
            Some(mock) => mock.rebase(&href),
            None => href,
        })
    }

    /// All sequences of the instance, fetched page by page as the stream is consumed.
    pub fn sequences(&self) -> impl Stream<Item = Result<Sequence>> + '_ {
        follow_next_links(self.base.compose(&["collections"]), move |url| async move {
            let page: CollectionsPage = self.get_json(url).await?;
            let next = self.next_page_url(&page.links);
            Ok(Page {
                items: page.collections,
                next,
            })
        })
    }

    #[instrument(skip(self), fields(base_url = self.base.as_str()))]
    pub async fn sequence(&self, sequence_id: &str) -> Result<Sequence> {
        let sequence_id = ResourceId::parse("sequence id", sequence_id)?;
        self.get_json(self.base.compose(&["collections", sequence_id.as_str()]))
            .await
    }

    /// The pictures of a sequence, fetched page by page as the stream is consumed.
    ///
    /// The id is checked before the stream is created.
    pub fn sequence_items(
        &self,
        sequence_id: &str,
    ) -> Result<impl Stream<Item = Result<ImageItem>> + '_> {
        let sequence_id = ResourceId::parse("sequence id", sequence_id)?;
        let first = self
            .base
            .compose(&["collections", sequence_id.as_str(), "items"]);
        Ok(follow_next_links(first, move |url| async move {
            let page: ItemCollection = self.get_json(url).await?;
            let next = self.next_page_url(&page.links);
            Ok(Page {
                items: page
                    .features
                    .into_iter()
                    .map(|item| self.absolute_assets(item))
                    .collect(),
                next,
            })
        }))
    }

    /// Search pictures.
    ///
    /// Searches with an `intersects` geometry are sent as `POST` with a JSON body.
    #[instrument(skip_all, fields(base_url = self.base.as_str(), limit = filter.limit))]
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<ImageItem>> {
        let encoded = filter.encode()?;

        let mut url = self.base.compose(&["search"]);
        let query = encoded.query_string();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        debug!(%url, has_body = encoded.body.is_some(), "searching pictures");

        let request = match encoded.body {
            Some(body) => TransportRequest::post(url).json(body),
            None => TransportRequest::get(url),
        };
        let page: ItemCollection = self.send_json(request).await?;
        debug!(results = page.features.len(), "search completed");

        Ok(page
            .features
            .into_iter()
            .map(|item| self.absolute_assets(item))
            .collect())
    }

    /// Look up a single picture.
    ///
    /// Without a sequence id the picture is looked up through [Self::search].
    #[instrument(skip(self), fields(base_url = self.base.as_str()))]
    pub async fn image_info(&self, image_id: &str, sequence_id: Option<&str>) -> Result<ImageItem> {
        let image_id = ResourceId::parse("image id", image_id)?;
        let sequence_id = sequence_id
            .map(|id| ResourceId::parse("sequence id", id))
            .transpose()?;

        match sequence_id {
            Some(sequence_id) => {
                let url = self.base.compose(&[
                    "collections",
                    sequence_id.as_str(),
                    "items",
                    image_id.as_str(),
                ]);
                let item: ImageItem = self.get_json(url).await?;
                Ok(self.absolute_assets(item))
            },
            None => {
                let filter = SearchFilter::new().ids([image_id.as_str()]);
                self.search(&filter)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| PanoramaxError::NotFound(image_id.to_string()))
            },
        }
    }

    /// Generate an unclaimed token.
    ///
    /// The token can only be used after a human opened [Token::claim_link] and accepted it.
    #[instrument(skip(self), fields(base_url = self.base.as_str()))]
    pub async fn generate_token(&self, description: &str) -> Result<Token> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("description", description)
            .finish();
        let url = format!(
            "{}?{query}",
            self.base.compose(&["auth", "tokens", "generate"])
        );
        self.send_json(TransportRequest::post(url)).await
    }

    /// Report a problem with a picture or a sequence.
    #[instrument(skip_all, fields(base_url = self.base.as_str(), issue = ?report.issue))]
    pub async fn report(&self, report: &ReportRequest) -> Result<Report> {
        if let Some(picture_id) = &report.picture_id {
            ResourceId::parse("picture id", picture_id)?;
        }
        if let Some(sequence_id) = &report.sequence_id {
            ResourceId::parse("sequence id", sequence_id)?;
        }
        self.send_json(TransportRequest::post(self.base.compose(&["reports"])).json(json!(report)))
            .await
    }

    /// Fetch the vector tile at `tile` and decode the pictures in it with `decoder`.
    #[instrument(skip(self, decoder), fields(base_url = self.base.as_str()))]
    pub async fn map_tile(
        &self,
        tile: TileCoordinates,
        decoder: &impl TileDecoder,
    ) -> Result<Vec<PicturePoint>> {
        let TileCoordinates { z, x, y } = tile;
        let url = self.base.compose_file(
            &["map".to_string(), z.to_string(), x.to_string()],
            &format!("{y}.mvt"),
        );
        let response = self
            .transport
            .send(TransportRequest::get(url))
            .await?
            .error_for_status()?;

        let points = decoder
            .decode(response.bytes())
            .map_err(|e| DecodeError::Tile {
                z,
                x,
                y,
                reason: e.to_string(),
            })?;
        debug!(points = points.len(), "decoded map tile");
        Ok(points)
    }

    /// A link that opens the instance's viewer on a picture or a location.
    pub fn view_link(&self, options: &ViewLinkOptions) -> Result<String> {
        Ok(build_view_link(&self.base, options)?)
    }
}

/// A client acting on behalf of a user.
///
/// Every request carries the user's token, including the anonymous
/// operations available through [PanoramaxClient].
#[derive(Debug, derive_more::Deref)]
pub struct AuthenticatedClient<T = ReqwestTransport> {
    client: PanoramaxClient<BearerAuth<T>>,
}

impl<T: Transport> AuthenticatedClient<T> {
    /// Create an empty sequence.
    #[instrument(skip(self), fields(base_url = self.base.as_str()))]
    pub async fn create_collection(&self, title: Option<&str>) -> Result<Sequence> {
        let body = match title {
            Some(title) => json!({ "title": title }),
            None => json!({}),
        };
        self.client
            .send_json(TransportRequest::post(self.base.compose(&["collections"])).json(body))
            .await
    }

    /// The sequences uploaded by the user.
    #[instrument(skip(self), fields(base_url = self.base.as_str()))]
    pub async fn my_sequences(&self) -> Result<Vec<SequenceLink>> {
        let url = self.base.compose(&["users", "me", "collection"]);
        let catalog: UserCatalog = self.client.get_json(url.clone()).await?;

        catalog
            .links
            .into_iter()
            .filter(|link| link.get("rel").and_then(|rel| rel.as_str()) == Some("child"))
            .map(|link| {
                serde_json::from_value::<SequenceLink>(link).map_err(|source| {
                    PanoramaxError::from(DecodeError::Json {
                        url: url.clone(),
                        source,
                    })
                })
            })
            .collect()
    }

    /// Upload a picture into a sequence.
    ///
    /// `progress` is notified while the picture bytes are sent.
    /// The upload either succeeds as a whole or fails, it is never retried.
    #[instrument(
        skip(self, image, options, progress),
        fields(base_url = self.base.as_str(), file_name = %image.file_name, size = image.bytes.len())
    )]
    pub async fn upload(
        &self,
        image: UploadImage,
        sequence_id: &str,
        options: &UploadOptions,
        progress: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<ImageItem> {
        let sequence_id = ResourceId::parse("sequence id", sequence_id)?;
        let url = self
            .base
            .compose(&["collections", sequence_id.as_str(), "items"]);
        let form = build_form(image, options);

        debug!(%url, fields = form.parts().len(), "uploading picture");
        let response = self
            .transport
            .send_with_progress(TransportRequest::post(url).multipart(form), progress)
            .await?
            .error_for_status_with_body()?;

        let item: ImageItem = response.json()?;
        Ok(self.absolute_assets(item))
    }
}
