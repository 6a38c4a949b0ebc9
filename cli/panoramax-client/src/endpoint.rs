//! Endpoint URL composition.
//!
//! Every Panoramax endpoint lives below a single `.../api/` root and ends
//! with a trailing separator, e.g. `https://panoramax.example/api/collections/`.

use url::Url;

use crate::error::ValidationError;
use crate::types::AssetLink;

const API_SEGMENT: &str = "api";

/// Normalize a base URL so that it ends in exactly one `api/` segment.
///
/// Trailing separators and repeated `api` suffixes are collapsed,
/// so normalizing twice yields the same result as normalizing once.
pub fn normalize_base_url(url: &str) -> String {
    let mut trimmed = url.trim().trim_end_matches('/');
    while let Some(stripped) = trimmed.strip_suffix(API_SEGMENT) {
        if !stripped.ends_with('/') {
            break;
        }
        trimmed = stripped.trim_end_matches('/');
    }
    format!("{trimmed}/{API_SEGMENT}/")
}

/// The validated root of a Panoramax API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointBase {
    url: Url,
}

impl EndpointBase {
    /// Normalize and validate `url`.
    ///
    /// Fails immediately on malformed input rather than on the first request.
    pub fn parse(url: &str) -> Result<Self, ValidationError> {
        let normalized = normalize_base_url(url);
        let parsed = Url::parse(&normalized).map_err(|source| ValidationError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(url.to_string()));
        }
        if parsed.host_str().is_none() {
            return Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                source: url::ParseError::EmptyHost,
            });
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(ValidationError::UnexpectedQuery(url.to_string()));
        }
        Ok(Self { url: parsed })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Host (and port, if not the default) of the API.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Scheme, host and port, without a trailing separator.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Path of the API root, e.g. `/api/`.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Join `segments` below the API root, with a trailing separator.
    ///
    /// `compose(&["collections", id, "items"])` yields `.../api/collections/<id>/items/`.
    pub fn compose<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut composed = self.url.as_str().to_string();
        for segment in segments {
            composed.push_str(segment.as_ref());
            composed.push('/');
        }
        composed
    }

    /// Like [Self::compose] but ends with a file name instead of a separator.
    pub fn compose_file<S: AsRef<str>>(&self, segments: &[S], file_name: &str) -> String {
        let mut composed = self.compose(segments);
        composed.push_str(file_name);
        composed
    }

    /// Rehydrate a host-relative link (`/path`) into an absolute URL on the API host.
    ///
    /// Anything else is returned unchanged, including scheme-relative
    /// links (`//host/path`), which never resolve to another host.
    pub fn make_absolute(&self, href: &str) -> String {
        match href.strip_prefix('/') {
            Some(path) if !path.starts_with('/') => format!("{}/{path}", self.origin()),
            _ => href.to_string(),
        }
    }

    /// [Self::make_absolute] applied to an asset link.
    pub fn make_asset_absolute(&self, asset: &mut AssetLink) {
        asset.href = self.make_absolute(&asset.href);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn normalize_appends_api_segment() {
        assert_eq!(
            normalize_base_url("https://panoramax.example"),
            "https://panoramax.example/api/"
        );
        assert_eq!(
            normalize_base_url("https://panoramax.example/"),
            "https://panoramax.example/api/"
        );
        assert_eq!(
            normalize_base_url("https://panoramax.example/api"),
            "https://panoramax.example/api/"
        );
    }

    #[test]
    fn normalize_collapses_repeated_suffixes() {
        assert_eq!(
            normalize_base_url("https://panoramax.example/api//api///"),
            "https://panoramax.example/api/"
        );
    }

    #[test]
    fn normalize_keeps_hosts_ending_in_api() {
        assert_eq!(
            normalize_base_url("https://myapi"),
            "https://myapi/api/"
        );
        assert_eq!(
            normalize_base_url("https://panoramax.example/geoapi/"),
            "https://panoramax.example/geoapi/api/"
        );
    }

    #[test]
    fn parse_rejects_malformed_url() {
        assert!(matches!(
            EndpointBase::parse("not a url"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            EndpointBase::parse("ftp://panoramax.example"),
            Err(ValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn parse_rejects_query_and_fragment() {
        for url in [
            "https://panoramax.example/?a=b",
            "https://panoramax.example/api?a=b",
            "https://panoramax.example/#x",
        ] {
            assert!(
                matches!(
                    EndpointBase::parse(url),
                    Err(ValidationError::UnexpectedQuery(ref rejected)) if rejected == url
                ),
                "{url} was accepted"
            );
        }
    }

    #[test]
    fn compose_joins_segments_with_trailing_separator() {
        let base = EndpointBase::parse("https://panoramax.example/").unwrap();
        assert_eq!(
            base.compose(&["collections", "abc", "items"]),
            "https://panoramax.example/api/collections/abc/items/"
        );
        assert_eq!(
            base.compose::<&str>(&[]),
            "https://panoramax.example/api/"
        );
        assert_eq!(
            base.compose_file(&["map", "14", "8"], "5.mvt"),
            "https://panoramax.example/api/map/14/8/5.mvt"
        );
    }

    #[test]
    fn relative_links_are_made_absolute() {
        let base = EndpointBase::parse("https://panoramax.example/api").unwrap();
        assert_eq!(
            base.make_absolute("/derivates/abc/sd.jpg"),
            "https://panoramax.example/derivates/abc/sd.jpg"
        );
        assert_eq!(
            base.make_absolute("https://cdn.example/abc/sd.jpg"),
            "https://cdn.example/abc/sd.jpg"
        );
    }

    #[test]
    fn make_absolute_keeps_port() {
        let base = EndpointBase::parse("http://127.0.0.1:5000").unwrap();
        assert_eq!(base.host(), "127.0.0.1:5000");
        assert_eq!(base.origin(), "http://127.0.0.1:5000");
        assert_eq!(base.path(), "/api/");
        assert_eq!(
            base.make_absolute("/pictures/hd.jpg"),
            "http://127.0.0.1:5000/pictures/hd.jpg"
        );
    }

    #[test]
    fn scheme_relative_links_stay_unresolved() {
        let base = EndpointBase::parse("https://panoramax.example/api").unwrap();
        let href = base.make_absolute("//evil.example/derivates/hd.jpg");
        assert_eq!(href, "//evil.example/derivates/hd.jpg");
        assert!(!href.starts_with("https://evil.example"));
        assert_eq!(base.make_absolute("/"), "https://panoramax.example/");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            host in "[a-z]{1,10}\\.[a-z]{2,3}",
            suffix in proptest::collection::vec(prop_oneof![Just("/"), Just("api"), Just("api/")], 0..6),
        ) {
            let url = format!("https://{host}/{}", suffix.concat());
            let once = normalize_base_url(&url);
            prop_assert_eq!(normalize_base_url(&once), once.clone());
            prop_assert!(once.ends_with("/api/"));
            prop_assert!(!once.ends_with("/api/api/"));
            prop_assert!(!once.ends_with("//api/"));
        }
    }
}
