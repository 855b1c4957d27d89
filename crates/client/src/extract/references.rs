//! Reference harvesting from HTML documents.

use instapage_core::media::is_image_locator;
use instapage_core::{ResourceReference, ResourceRole};
use scraper::{ElementRef, Html, Selector};

/// References found in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    /// Whether the page carries the `data-request="true"` marker.
    pub opted_in: bool,
    /// References in document order.
    pub references: Vec<ResourceReference>,
}

/// Scan a document for deferred references.
///
/// Recognized elements:
/// - `link[data-href]`: stylesheet, or icon when `rel` names an icon or the
///   locator has an image extension
/// - `script[data-src]`: script
/// - `img[data-src]`: icon
pub fn scan_page(html: &str) -> PageScan {
    let document = Html::parse_document(html);
    let marker = Selector::parse("script[data-request]").expect("invalid selector");
    let deferred = Selector::parse("link[data-href], script[data-src], img[data-src]").expect("invalid selector");

    let opted_in = document
        .select(&marker)
        .next()
        .is_some_and(|script| script.value().attr("data-request") == Some("true"));

    if !opted_in {
        tracing::warn!("no script[data-request=\"true\"] marker, skipping page");
        return PageScan::default();
    }

    let references = document.select(&deferred).filter_map(reference_for).collect();

    PageScan { opted_in, references }
}

fn reference_for(element: ElementRef<'_>) -> Option<ResourceReference> {
    let el = element.value();
    match el.name() {
        "link" => {
            let locator = non_empty(el.attr("data-href"))?;
            let rel_icon = el
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("icon")));
            let role = if rel_icon || is_image_locator(locator) {
                ResourceRole::Icon
            } else {
                ResourceRole::Stylesheet
            };
            Some(ResourceReference::new(locator, role))
        }
        "script" => non_empty(el.attr("data-src")).map(ResourceReference::script),
        "img" => non_empty(el.attr("data-src")).map(ResourceReference::icon),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
