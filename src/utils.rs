//! Text helpers shared by the feed parsers and the renderer.
//!
//! - HTML fragment to plain text, and first-image lookup, via `scraper`
//! - Whitespace collapsing and char-safe truncation
//! - Scrubbing HTML-only entities that XML parsers reject

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("static regex"));

/// Named entities every XML parser understands.
const XML_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (on a char boundary) with an ellipsis and
/// the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Truncate to at most `max` characters, appending `...` when anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max).collect();
    format!("{}...", head.trim_end())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Reduce an HTML fragment to its visible text.
///
/// Plain text passes through unchanged apart from whitespace collapsing.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return collapse_whitespace(fragment);
    }
    let doc = Html::parse_fragment(fragment);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// `src` of the first `<img>` in an HTML fragment, if any.
pub fn first_image_src(fragment: &str) -> Option<String> {
    if !fragment.contains("<img") {
        return None;
    }
    let selector = Selector::parse("img[src]").ok()?;
    let doc = Html::parse_fragment(fragment);
    doc.select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

/// Rewrite HTML named entities that XML does not define.
///
/// Feeds frequently embed `&nbsp;`, `&eacute;` and friends outside CDATA, which
/// a strict XML parser rejects. Known HTML entities become numeric character
/// references; unknown names get their `&` escaped so they survive as text.
/// The five XML entities are left alone.
///
/// # Arguments
/// * `s` - Raw feed document.
///
/// # Returns
/// The document with only XML-defined named entities remaining.
pub fn scrub_html_entities_for_xml(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &Captures| {
            let whole = &caps[0];
            let name = &caps[1];
            if XML_ENTITIES.contains(&name) {
                return whole.to_string();
            }
            let decoded = html_escape::decode_html_entities(whole);
            if decoded == whole {
                format!("&amp;{name};")
            } else {
                decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
            }
        })
        .into_owned()
}
