//! HTML attribute collection

use super::LinkSelector;
use scraper::{Html, Selector};

/// Collects the non-empty link attributes for `selector` in document order
///
/// The document is parsed in full and its values collected up front because the
/// parsed tree cannot be held across the caller's await points. Resolving each
/// value into a URL stays lazy in [`super::Links`].
pub(super) fn attribute_values(html: &str, selector: LinkSelector) -> Vec<String> {
    let (css, attribute) = match selector {
        LinkSelector::Anchors => ("a[href]", "href"),
        LinkSelector::Images => ("img[src]", "src"),
        LinkSelector::NestedText => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let mut values = Vec::new();

    if let Ok(css_selector) = Selector::parse(css) {
        for element in document.select(&css_selector) {
            if let Some(value) = element.value().attr(attribute) {
                let value = value.trim();
                if !value.is_empty() {
                    values.push(value.to_string());
                }
            }
        }
    }

    values
}
