//! Link extraction from fetched markup
//!
//! The remote site exposes chapters as anchors, pages as images, and the series
//! cover as text nested in a feed. [`extract`] turns a response body into a finite,
//! single-pass iterator of resolved URLs for one of those positions.
//!
//! # Error behavior
//!
//! - End of input ends the iteration without an error.
//! - Markup is decoded leniently: bytes that are not UTF-8 become replacement
//!   characters, so a page in a legacy encoding still yields its ASCII links.
//! - A feed that cannot be parsed yields exactly one `Err` and then ends.
//! - A link that does not resolve to a URL yields an `Err` in its position; links
//!   before it have already been yielded and the caller decides whether to go on.

mod feed;
mod markup;

use thiserror::Error;
use url::Url;

use feed::FeedScanner;

/// Errors produced while extracting links
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("feed is malformed: {0}")]
    Feed(#[from] quick_xml::Error),

    #[error("invalid link {href:?}: {source}")]
    Link {
        href: String,
        source: url::ParseError,
    },
}

/// Which markup position links are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSelector {
    /// `href` of `<a>` elements
    Anchors,
    /// `src` of `<img>` elements
    Images,
    /// Text at depth two of the `<image>`/`<url>` pair in a feed
    NestedText,
}

/// Iterator over the links found in one response body
pub struct Links {
    base: Url,
    state: State,
}

enum State {
    Markup(std::vec::IntoIter<String>),
    Feed(Box<FeedScanner>),
    Done,
}

/// Extracts links from a response body
///
/// Relative references are resolved against `base`, the URL the body was fetched
/// from.
///
/// # Example
///
/// ```
/// use cbz_stream::extract::{extract, LinkSelector};
/// use url::Url;
///
/// let base = Url::parse("https://example.com/series/1/full-chapter-list").unwrap();
/// let body = br#"<ul><li><a href="/chapters/1">One</a></li></ul>"#;
///
/// let links: Vec<_> = extract(body, &base, LinkSelector::Anchors).collect();
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_ref().unwrap().as_str(), "https://example.com/chapters/1");
/// ```
pub fn extract(body: &[u8], base: &Url, selector: LinkSelector) -> Links {
    let state = match selector {
        LinkSelector::Anchors | LinkSelector::Images => {
            let text = String::from_utf8_lossy(body);
            State::Markup(markup::attribute_values(&text, selector).into_iter())
        }
        LinkSelector::NestedText => State::Feed(Box::new(FeedScanner::new(body.to_vec()))),
    };

    Links {
        base: base.clone(),
        state,
    }
}

impl Iterator for Links {
    type Item = Result<Url, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            State::Markup(values) => {
                let href = values.next()?;
                Some(resolve(&self.base, &href))
            }
            State::Feed(scanner) => {
                let step = scanner.next_text();
                match step {
                    Ok(Some(text)) => Some(resolve(&self.base, &text)),
                    Ok(None) => {
                        self.state = State::Done;
                        None
                    }
                    Err(e) => {
                        self.state = State::Done;
                        Some(Err(e))
                    }
                }
            }
            State::Done => None,
        }
    }
}

/// Resolves a link against the page it was found on
fn resolve(base: &Url, href: &str) -> Result<Url, ExtractError> {
    base.join(href.trim()).map_err(|source| ExtractError::Link {
        href: href.to_string(),
        source,
    })
}
