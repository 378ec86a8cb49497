//! Inline `style` attribute declarations.

/// Split a declaration block into `(property, value)` pairs.
///
/// Semicolons inside parentheses or quotes do not end a declaration, so
/// `url("data:image/gif;base64,...")` stays intact.
pub(crate) fn parse(decls: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in decls.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                push_declaration(&decls[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_declaration(&decls[start..], &mut out);
    out
}

fn push_declaration(decl: &str, out: &mut Vec<(String, String)>) {
    let Some((property, value)) = decl.split_once(':') else {
        return;
    };
    let property = property.trim().to_ascii_lowercase();
    let value = value.trim();
    if property.is_empty() || value.is_empty() {
        return;
    }
    match out.iter_mut().find(|(p, _)| *p == property) {
        Some((_, existing)) => *existing = value.to_string(),
        None => out.push((property, value.to_string())),
    }
}

pub(crate) fn serialize(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(property, value)| format!("{property}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of `property`, empty when unset.
pub(crate) fn get(decls: &str, property: &str) -> String {
    parse(decls)
        .into_iter()
        .find(|(p, _)| p == property)
        .map(|(_, value)| value)
        .unwrap_or_default()
}

/// Declaration block with `property` set; an empty value removes it.
pub(crate) fn set(decls: &str, property: &str, value: &str) -> String {
    let mut parsed = parse(decls);
    let value = value.trim();
    match parsed.iter().position(|(p, _)| p == property) {
        Some(index) if value.is_empty() => {
            parsed.remove(index);
        }
        Some(index) => parsed[index].1 = value.to_string(),
        None if value.is_empty() => {}
        None => parsed.push((property.to_string(), value.to_string())),
    }
    serialize(&parsed)
}

/// Pixel length such as `120px` or `120`.
pub(crate) fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_url_intact() {
        let decls = parse("color: red; background-image: url(\"data:image/gif;base64,AA\") ;");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].0, "background-image");
        assert_eq!(decls[1].1, "url(\"data:image/gif;base64,AA\")");
    }

    #[test]
    fn test_get_and_set() {
        let decls = "background-image:url(y.jpg)";
        assert_eq!(get(decls, "background-image"), "url(y.jpg)");
        assert_eq!(get(decls, "color"), "");

        let decls = set(decls, "background-image", "none");
        assert_eq!(decls, "background-image: none;");
        let decls = set(&decls, "height", "300px");
        assert_eq!(decls, "background-image: none; height: 300px;");
        assert_eq!(set(&decls, "background-image", ""), "height: 300px;");
    }

    #[test]
    fn test_parse_px() {
        assert_eq!(parse_px("120px"), Some(120.0));
        assert_eq!(parse_px(" 80 "), Some(80.0));
        assert_eq!(parse_px("50%"), None);
        assert_eq!(parse_px("auto"), None);
    }
}
