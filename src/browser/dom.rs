use scraper::{ElementRef, Html, Selector};

use super::ElementHandle;
use crate::error::{Result, ScrapeError};
use crate::parser::visible_text;

/// Scraper-backed page model behind the non-rendering browsers.
///
/// Element handles index into an arena of outer-HTML fragments, so nothing
/// `!Send` from the parser outlives a single call.
#[derive(Debug, Default, Clone)]
pub struct PageDom {
    markup: String,
    arena: Vec<String>,
}

impl PageDom {
    pub fn load(&mut self, markup: String) {
        self.markup = markup;
        self.arena.clear();
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        let fragments = select_outer(&self.markup, selector, false)?;
        Ok(fragments.into_iter().map(|f| self.push(f)).collect())
    }

    pub fn query(
        &mut self,
        selector: &str,
        within: ElementHandle,
    ) -> Result<Option<ElementHandle>> {
        let scope = self.fragment(within)?;
        let first = select_outer(scope, selector, true)?.into_iter().next();
        Ok(first.map(|f| self.push(f)))
    }

    pub fn inner_text(&self, element: ElementHandle) -> Result<String> {
        let doc = Html::parse_fragment(self.fragment(element)?);
        Ok(visible_text(doc.root_element()))
    }

    pub fn attribute(&self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        let doc = Html::parse_fragment(self.fragment(element)?);
        let value = doc
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .and_then(|el| el.value().attr(name).map(String::from));
        Ok(value)
    }

    pub fn outer_html(&self, element: ElementHandle) -> Result<String> {
        self.fragment(element).map(String::from)
    }

    fn fragment(&self, element: ElementHandle) -> Result<&str> {
        self.arena
            .get(element.0)
            .map(String::as_str)
            .ok_or_else(|| ScrapeError::Dom(format!("stale element handle {}", element.0)))
    }

    fn push(&mut self, fragment: String) -> ElementHandle {
        self.arena.push(fragment);
        ElementHandle(self.arena.len() - 1)
    }
}

fn select_outer(markup: &str, selector: &str, fragment: bool) -> Result<Vec<String>> {
    let sel = Selector::parse(selector)
        .map_err(|e| ScrapeError::Dom(format!("invalid selector {:?}: {:?}", selector, e)))?;
    let doc = if fragment {
        Html::parse_fragment(markup)
    } else {
        Html::parse_document(markup)
    };
    let root = doc.root_element();
    // The scope element itself never matches its own descendant query.
    let scope_id = root.children().find_map(ElementRef::wrap).map(|el| el.id());
    Ok(doc
        .select(&sel)
        .filter(|el| !fragment || Some(el.id()) != scope_id)
        .map(|el| el.html())
        .collect())
}
