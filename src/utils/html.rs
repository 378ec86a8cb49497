//! HTML utility functions.
//!
//! Provides the HTML helpers used by the in-memory page:
//! - `escape()`, `escape_attr()` - entity escaping for text and attribute values
//! - `unescape()` - decode entities found in parsed markup
//! - `is_void_element()` - elements without a closing tag (img, link, etc.)
//! - `is_raw_text_element()` - elements whose content is never escaped (script, style)
//! - `is_replaced_element()` - elements with an intrinsic box (img, video, etc.)
//! - `open_tag_attributes()`, `parse_attributes()` - attribute parsing from raw tags

use std::borrow::Cow;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters escaped in text content.
const TEXT_ESCAPES: [char; 3] = ['<', '>', '&'];

/// Characters escaped inside double-quoted attribute values.
const ATTR_ESCAPES: [char; 2] = ['&', '"'];

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        _ => None,
    }
}

/// Escape HTML special characters in text content.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
///
/// # Example
/// ```ignore
/// assert_eq!(escape("a < b"), "a &lt; b");
/// assert_eq!(escape("hello"), "hello"); // No allocation
/// ```
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    escape_with(s, &TEXT_ESCAPES)
}

/// Escape a value written inside a double-quoted attribute.
///
/// Single quotes stay as-is so CSS like `url('a.jpg')` survives a round trip.
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    escape_with(s, &ATTR_ESCAPES)
}

/// Internal: escape with specified character set.
#[inline]
fn escape_with<'a>(s: &'a str, chars: &[char]) -> Cow<'a, str> {
    if !s.contains(chars) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c).filter(|_| chars.contains(&c)) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Unescape HTML entities back to characters.
///
/// Handles common named entities and numeric character references.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '&' {
            result.push(c);
            continue;
        }

        // Collect entity
        let mut entity = String::new();
        let mut terminated = false;
        while let Some(&next) = chars.peek() {
            if next == ';' {
                chars.next();
                terminated = true;
                break;
            }
            if (!next.is_ascii_alphanumeric() && next != '#') || entity.len() > 10 {
                break;
            }
            entity.push(next);
            chars.next();
        }

        if !terminated {
            result.push('&');
            result.push_str(&entity);
            continue;
        }

        // Decode entity
        match entity.as_str() {
            "lt" => result.push('<'),
            "gt" => result.push('>'),
            "amp" => result.push('&'),
            "quot" => result.push('"'),
            "apos" => result.push('\''),
            "nbsp" => result.push('\u{00A0}'),
            s if s.starts_with('#') => {
                let code = if s.starts_with("#x") || s.starts_with("#X") {
                    u32::from_str_radix(&s[2..], 16).ok()
                } else {
                    s[1..].parse().ok()
                };
                match code.and_then(char::from_u32) {
                    Some(c) => result.push(c),
                    None => {
                        result.push('&');
                        result.push_str(&entity);
                        result.push(';');
                    }
                }
            }
            _ => {
                result.push('&');
                result.push_str(&entity);
                result.push(';');
            }
        }
    }

    Cow::Owned(result)
}

// =============================================================================
// Attribute Parsing
// =============================================================================

/// Attribute section of the opening tag at the start of `raw`.
///
/// `<video controls src="a.mp4">…` yields ` controls src="a.mp4"`. A `>`
/// inside a quoted value does not end the tag.
pub fn open_tag_attributes(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix('<') else {
        return "";
    };
    let start = rest
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    let body = &rest[start..];

    let mut quote = None;
    for (i, c) in body.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return body[..i].trim_end_matches('/'),
            None => {}
        }
    }
    body.trim_end_matches('/')
}

/// Parse HTML attributes from an attribute string, in document order.
///
/// Names are lowercased; valueless attributes get an empty value. Values
/// are returned raw, entities still encoded.
///
/// # Example
/// ```ignore
/// let attrs = parse_attributes(r#"async data-lazy="/js/a.js""#);
/// // [("async", ""), ("data-lazy", "/js/a.js")]
/// ```
pub fn parse_attributes(s: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        // Stray slashes (`<br/>`, `<img / src=x>`) separate like whitespace
        if c.is_whitespace() || c == '/' {
            continue;
        }

        // Read attribute name
        let mut name = String::new();
        name.push(c.to_ascii_lowercase());
        while let Some(next) = chars.next_if(|&n| n != '=' && n != '/' && !n.is_whitespace()) {
            name.push(next.to_ascii_lowercase());
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        if chars.next_if_eq(&'=').is_none() {
            attrs.push((name, String::new()));
            continue;
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        // Read value
        let mut value = String::new();
        if let Some(quote) = chars.next_if(|&c| c == '"' || c == '\'') {
            for c in chars.by_ref() {
                if c == quote {
                    break;
                }
                value.push(c);
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }
        attrs.push((name, value));
    }

    attrs
}

// =============================================================================
// Element Classification
// =============================================================================

/// Check if an HTML tag is a void element (no closing tag, no children).
#[inline]
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Check if tag is a raw text element (content should not be HTML-escaped).
#[inline]
pub fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Check if tag is a replaced element that gets an intrinsic box.
#[inline]
pub fn is_replaced_element(tag: &str) -> bool {
    matches!(tag, "img" | "video" | "audio" | "iframe" | "canvas")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain() {
        assert_eq!(escape("hello world"), "hello world");
    }

    #[test]
    fn test_escape_text_chars() {
        assert_eq!(escape("<b>"), "&lt;b&gt;");
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape("say \"hi\""), "say \"hi\"");
    }

    #[test]
    fn test_escape_attr_keeps_single_quotes() {
        assert_eq!(escape_attr("url('y.jpg')"), "url('y.jpg')");
        assert_eq!(escape_attr("a\"b&c"), "a&quot;b&amp;c");
        assert_eq!(escape_attr("a<b"), "a<b");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("hello"), "hello");
        assert_eq!(unescape("&lt;script&gt;"), "<script>");
        assert_eq!(unescape("a &amp; b"), "a & b");
        assert_eq!(unescape("&quot;hi&quot;"), "\"hi\"");
        assert_eq!(unescape("&#39;"), "'");
        assert_eq!(unescape("&#x27;"), "'");
        assert_eq!(unescape("&#65;"), "A");
    }

    #[test]
    fn test_unescape_bare_ampersand() {
        assert_eq!(unescape("a.jpg?w=1&h=2"), "a.jpg?w=1&h=2");
        assert_eq!(unescape("fish & chips"), "fish & chips");
    }

    #[test]
    fn test_open_tag_attributes() {
        assert_eq!(
            open_tag_attributes(r#"<video controls src="a.mp4"></video>"#),
            r#" controls src="a.mp4""#
        );
        assert_eq!(
            open_tag_attributes(r#"<img alt="a>b" src=x.jpg>"#),
            r#" alt="a>b" src=x.jpg"#
        );
        assert_eq!(open_tag_attributes("<br/>"), "");
        assert_eq!(open_tag_attributes("<p>text</p>"), "");
        assert_eq!(open_tag_attributes("text"), "");
    }

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_attributes_valueless_anywhere() {
        assert_eq!(
            parse_attributes(r#"async data-lazy="/js/a.js" defer"#),
            owned(&[("async", ""), ("data-lazy", "/js/a.js"), ("defer", "")])
        );
        assert_eq!(
            parse_attributes("id='v' controls muted src=clip.mp4"),
            owned(&[("id", "v"), ("controls", ""), ("muted", ""), ("src", "clip.mp4")])
        );
        assert_eq!(parse_attributes(r#"SRC = "x.jpg" /"#), owned(&[("src", "x.jpg")]));
        assert_eq!(parse_attributes(r#"alt="""#), owned(&[("alt", "")]));
        assert!(parse_attributes("  ").is_empty());
    }

    #[test]
    fn test_element_classification() {
        assert!(is_void_element("img"));
        assert!(is_void_element("link"));
        assert!(!is_void_element("div"));
        assert!(is_raw_text_element("script"));
        assert!(!is_raw_text_element("div"));
        assert!(is_replaced_element("video"));
        assert!(!is_replaced_element("div"));
    }
}
