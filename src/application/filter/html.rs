//! HTML-oriented filters.

use url::form_urlencoded;

use super::registry::FilterRegistry;

pub(super) fn register(registry: &mut FilterRegistry) {
    for name in ["HtmlEscape", "H", "HTML"] {
        registry.register_simple(name, "Escape HTML special characters", html_escape);
    }
    for name in ["UriEscape", "U", "URI"] {
        registry.register_simple(name, "Percent-encode text for use inside a URI", uri_escape);
    }
    registry.register_simple(
        "HtmlPara",
        "Wrap blank-line separated paragraphs in <p> tags",
        html_para,
    );
}

pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Spaces become `%20`; a literal `+` is already encoded as `%2B` by the serializer.
pub fn uri_escape(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

pub fn html_para(text: &str) -> String {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .iter()
        .map(|lines| format!("<p>\n{}\n</p>\n", lines.join("\n")))
        .collect::<Vec<_>>()
        .join("\n")
}
