use crate::{CbzError, UrlError, UrlResult};
use url::Url;

/// Checks that a URL path has exactly two non-empty segments
///
/// Both series (`/{namespace}/{id}`) and chapter URLs must have this shape. A
/// trailing slash counts as an extra (empty) segment and is rejected.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use cbz_stream::url::validate_path_shape;
///
/// let url = Url::parse("https://example.com/series/1").unwrap();
/// assert!(validate_path_shape(&url).is_ok());
///
/// let url = Url::parse("https://example.com/series/1/extra").unwrap();
/// assert!(validate_path_shape(&url).is_err());
/// ```
pub fn validate_path_shape(url: &Url) -> UrlResult<()> {
    let path = url.path();
    let trimmed = path.strip_prefix('/').unwrap_or(path);

    match trimmed.split_once('/') {
        Some((first, rest)) if !first.is_empty() && !rest.is_empty() && !rest.contains('/') => {
            Ok(())
        }
        _ => Err(UrlError::PathShape(path.to_string())),
    }
}

/// Parses the series URL supplied by a client
///
/// A string that is not a URL at all is a parse error; a URL with a non-HTTP
/// scheme or the wrong path shape is a validation error.
pub fn parse_series_url(raw: &str) -> Result<Url, CbzError> {
    let url = Url::parse(raw.trim())?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()).into());
    }

    validate_path_shape(&url)?;
    Ok(url)
}

/// Appends one path segment to a URL
///
/// Unlike [`Url::join`], the last segment of `base` is kept:
/// `https://x/series/1` + `full-chapter-list` gives `https://x/series/1/full-chapter-list`.
/// Query and fragment are dropped.
pub fn join_segment(base: &Url, segment: &str) -> UrlResult<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| UrlError::PathShape(base.path().to_string()))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}
