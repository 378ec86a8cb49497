//! Minimal CSS selector engine.
//!
//! Supports type (`img`, `*`), `#id`, `.class`, `[attr]`, `[attr="v"]`,
//! compound selectors (`img.hero[data-lazy]`) and comma lists. Combinators
//! are rejected.

use super::tree::{Document, NodeId};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id
            && doc.attr(node, "id") != Some(id.as_str())
        {
            return false;
        }
        self.classes.iter().all(|c| doc.has_class(node, c))
            && self.attrs.iter().all(|attr| match (&attr.value, doc.attr(node, &attr.name)) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(expected), Some(actual)) => expected == actual,
            })
    }
}

/// A parsed comma-separated selector list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectorList(Vec<Compound>);

impl SelectorList {
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.0.iter().any(|compound| compound.matches(doc, node))
    }
}

impl FromStr for SelectorList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compounds = s
            .split(',')
            .map(|part| parse_compound(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(compounds))
    }
}

fn parse_compound(s: &str) -> Result<Compound, String> {
    if s.is_empty() {
        return Err("empty selector".to_string());
    }

    let mut compound = Compound::default();
    let mut rest = s;

    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '*'))
        .unwrap_or(rest.len());
    if tag_len > 0 {
        let tag = &rest[..tag_len];
        if tag != "*" {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[tag_len..];
    }

    while let Some(c) = rest.chars().next() {
        match c {
            '#' | '.' => {
                let (name, tail) = take_ident(&rest[1..]);
                if name.is_empty() {
                    return Err(format!("missing name after `{c}` in `{s}`"));
                }
                if c == '#' {
                    compound.id = Some(name.to_string());
                } else {
                    compound.classes.push(name.to_string());
                }
                rest = tail;
            }
            '[' => {
                let end = rest
                    .find(']')
                    .ok_or_else(|| format!("unterminated attribute selector in `{s}`"))?;
                compound.attrs.push(parse_attr(&rest[1..end])?);
                rest = &rest[end + 1..];
            }
            _ => return Err(format!("unsupported selector `{s}`")),
        }
    }
    Ok(compound)
}

fn take_ident(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn parse_attr(inner: &str) -> Result<AttrMatch, String> {
    let (name, value) = match inner.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_string()))
        }
        None => (inner.trim(), None),
    };
    if name.is_empty() {
        return Err(format!("missing attribute name in `[{inner}]`"));
    }
    Ok(AttrMatch {
        name: name.to_ascii_lowercase(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::parse::parse_fragment;

    fn select(html: &str, selector: &str) -> Vec<String> {
        let mut doc = Document::new();
        for node in parse_fragment(&mut doc, html) {
            doc.append(doc.body(), node);
        }
        let selector: SelectorList = selector.parse().unwrap();
        doc.descendants(doc.body())
            .into_iter()
            .filter(|n| selector.matches(&doc, *n))
            .map(|n| doc.outer_html(n))
            .collect()
    }

    #[test]
    fn test_attribute_selectors() {
        let html = r#"<img data-lazy="a.jpg"><img src="b.jpg"><div data-lazy-bkg="url(c)"></div>"#;
        assert_eq!(select(html, "[data-lazy]"), vec![r#"<img data-lazy="a.jpg">"#]);
        assert_eq!(select(html, r#"img[src="b.jpg"]"#).len(), 1);
        assert_eq!(select(html, "[data-lazy], [data-lazy-bkg]").len(), 2);
    }

    #[test]
    fn test_compound_selectors() {
        let html = r#"<p id="intro" class="lead note">x</p><p class="note">y</p>"#;
        assert_eq!(select(html, "p.note").len(), 2);
        assert_eq!(select(html, "p.note.lead").len(), 1);
        assert_eq!(select(html, "#intro").len(), 1);
        assert_eq!(select(html, "*").len(), 2);
    }

    #[test]
    fn test_rejects_combinators() {
        assert!("div img".parse::<SelectorList>().is_err());
        assert!("div > img".parse::<SelectorList>().is_err());
        assert!("".parse::<SelectorList>().is_err());
        assert!("[data-lazy".parse::<SelectorList>().is_err());
    }
}
