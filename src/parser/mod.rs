pub mod classify;
pub mod excerpt;
pub mod profile;
pub mod scan;
pub mod selectors;
pub mod urls;

use scraper::{ElementRef, Node, Selector};
use tracing::debug;

/// Try candidates in order and return the first non-`None` result.
///
/// Every cascade in the parser (selectors, strategies) goes through here, so
/// "first match wins" stays the single rule, never "best match".
pub fn first_match<C, T, F>(candidates: impl IntoIterator<Item = C>, try_fn: F) -> Option<T>
where
    F: FnMut(C) -> Option<T>,
{
    candidates.into_iter().find_map(try_fn)
}

/// Parse a configured selector, skipping (and logging) invalid ones.
pub fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("Skipping invalid selector {:?}: {:?}", selector, e);
            None
        }
    }
}

/// Collapse all whitespace runs to single spaces.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop the employment-type suffix: "Acme Corp · Full-time" → "Acme Corp".
pub fn clean_employer(raw: &str) -> String {
    let first = raw.split(" · ").next().unwrap_or_default();
    normalize_ws(first)
}

/// Longest prefix of `s` with at most `max` chars.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn is_hidden(el: &scraper::node::Element) -> bool {
    matches!(el.name(), "script" | "style" | "noscript" | "template")
        || el.classes().any(|c| c == "visually-hidden" || c == "sr-only")
}

/// Rendered text of an element: skips scripts and screen-reader-only spans,
/// whitespace-normalized.
pub fn visible_text(el: ElementRef) -> String {
    let mut parts = Vec::new();
    collect_text(el, &mut parts);
    normalize_ws(&parts.join(" "))
}

fn collect_text<'a>(el: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push(t),
            Node::Element(e) if !is_hidden(e) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Each visible text node under `el`, in document order, trimmed and non-empty.
pub fn text_nodes(el: ElementRef) -> Vec<String> {
    let mut parts = Vec::new();
    collect_text(el, &mut parts);
    parts
        .into_iter()
        .map(normalize_ws)
        .filter(|t| !t.is_empty())
        .collect()
}

/// First non-empty visible text among `candidates`, each applied inside `scope`.
pub fn first_text_in(scope: ElementRef, candidates: &[String]) -> Option<String> {
    first_match(candidates, |sel| {
        let sel = compile(sel)?;
        let text = visible_text(scope.select(&sel).next()?);
        (!text.is_empty()).then_some(text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn first_match_takes_registration_order() {
        let found = first_match(["a", "bb", "cc"], |c| (c.len() == 2).then_some(c));
        assert_eq!(found, Some("bb"));
    }

    #[test]
    fn first_match_empty() {
        let found: Option<&str> = first_match(Vec::<&str>::new(), Some);
        assert!(found.is_none());
    }

    #[test]
    fn employer_loses_employment_type() {
        assert_eq!(clean_employer("Acme Corp · Full-time"), "Acme Corp");
        assert_eq!(clean_employer("  Globex  "), "Globex");
    }

    #[test]
    fn visible_text_skips_screen_reader_spans() {
        let doc = Html::parse_fragment(
            r#"<a><span aria-hidden="true">Bob  Smith</span><span class="visually-hidden">View Bob Smith’s profile</span></a>"#,
        );
        let a = doc.select(&Selector::parse("a").unwrap()).next().unwrap();
        assert_eq!(visible_text(a), "Bob Smith");
    }

    #[test]
    fn text_nodes_in_order() {
        let doc =
            Html::parse_fragment("<div><h3>Grace Hopper</h3><p> Rear\n Admiral </p><p></p></div>");
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        assert_eq!(text_nodes(div), vec!["Grace Hopper", "Rear Admiral"]);
    }

    #[test]
    fn nested_cascade_falls_through_per_scope() {
        let doc = Html::parse_fragment(r#"<div class="card"><span class="b">second</span></div>"#);
        let card = doc.select(&Selector::parse(".card").unwrap()).next().unwrap();
        let candidates = vec![".a".to_string(), "[[bad".to_string(), ".b".to_string()];
        assert_eq!(first_text_in(card, &candidates).as_deref(), Some("second"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("Zoë Ødegård", 3), "Zoë");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
