use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use super::classify::OrganizationClassifier;
use super::selectors::{Role, SelectorRegistry};
use super::urls::UrlNormalizer;
use super::{clean_employer, compile, first_match, first_text_in, text_nodes};
use crate::browser::{Browser, ElementHandle};
use crate::error::Result;
use crate::record::ProfileRecord;

/// Fields read from one card, before filtering.
struct CardFields {
    name: String,
    subtitle: String,
    employer: String,
    href: Option<String>,
    fragment: String,
}

/// Finds profile cards on a listing page.
///
/// Three passes: the live DOM through the browser, a static parse of the page
/// markup as a second opinion, and a generic text heuristic when neither finds
/// a known container. Zero records means the page layout was not recognized.
pub struct ContainerScanner<'a> {
    registry: &'a SelectorRegistry,
    urls: &'a UrlNormalizer,
}

impl<'a> ContainerScanner<'a> {
    pub fn new(registry: &'a SelectorRegistry, urls: &'a UrlNormalizer) -> Self {
        ContainerScanner { registry, urls }
    }

    pub async fn scan<B>(&self, markup: &str, browser: &mut B) -> Vec<ProfileRecord>
    where
        B: Browser + ?Sized,
    {
        let live = self.scan_live(browser).await;

        let records = if live.is_empty() || live.iter().any(|r| !r.has_url()) {
            info!(
                "Live scan gave {} records ({} without link), checking static markup",
                live.len(),
                live.iter().filter(|r| !r.has_url()).count()
            );
            merge_by_position(live, self.scan_markup(markup))
        } else {
            live
        };

        if records.is_empty() {
            info!("No known container matched, trying generic containers");
            return self.last_resort(markup);
        }
        records
    }

    async fn scan_live<B>(&self, browser: &mut B) -> Vec<ProfileRecord>
    where
        B: Browser + ?Sized,
    {
        let mut working_set = Vec::new();
        for selector in self.registry.candidates_for(Role::Container) {
            match browser.query_all(selector).await {
                Ok(found) if !found.is_empty() => {
                    info!("Container selector {:?} matched {} elements", selector, found.len());
                    working_set = found;
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!("Container selector {:?} failed: {}", selector, e),
            }
        }

        let mut records = Vec::new();
        for (index, handle) in working_set.into_iter().enumerate() {
            match self.read_live_card(browser, handle).await {
                Ok(Some(card)) => {
                    if let Some(record) = self.build_record(card) {
                        records.push(record);
                    }
                }
                Ok(None) => warn!("Skipping container {}: no name found", index),
                Err(e) => warn!("Skipping container {}: {}", index, e),
            }
        }
        records
    }

    async fn read_live_card<B>(
        &self,
        browser: &mut B,
        card: ElementHandle,
    ) -> Result<Option<CardFields>>
    where
        B: Browser + ?Sized,
    {
        let names = self.registry.candidates_for(Role::Name);
        let Some(name) = live_text(browser, card, names).await? else {
            return Ok(None);
        };
        let subtitle = live_text(browser, card, self.registry.candidates_for(Role::Title))
            .await?
            .unwrap_or_default();
        let employer = live_text(browser, card, self.registry.candidates_for(Role::Employer))
            .await?
            .unwrap_or_default();

        // Per selector only the first match counts, in both passes.
        let mut href = None;
        for selector in self.registry.candidates_for(Role::ProfileLink) {
            let Ok(Some(link)) = browser.query(selector, card).await else {
                continue;
            };
            if let Some(value) = browser.attribute(link, "href").await? {
                if self.urls.is_profile_url(&value) {
                    href = Some(value);
                    break;
                }
            }
        }

        let fragment = browser.outer_html(card).await?;
        Ok(Some(CardFields {
            name,
            subtitle,
            employer,
            href,
            fragment,
        }))
    }

    /// Static pass over serialized markup, same cascades as the live pass.
    pub fn scan_markup(&self, markup: &str) -> Vec<ProfileRecord> {
        let doc = Html::parse_document(markup);
        let cards = first_match(self.registry.candidates_for(Role::Container), |selector| {
            let sel = compile(selector)?;
            let found: Vec<ElementRef> = doc.select(&sel).collect();
            (!found.is_empty()).then_some(found)
        })
        .unwrap_or_default();

        cards
            .into_iter()
            .enumerate()
            .filter_map(|(index, card)| match self.read_static_card(card) {
                Some(fields) => self.build_record(fields),
                None => {
                    debug!("Static pass: container {} has no name", index);
                    None
                }
            })
            .collect()
    }

    fn read_static_card(&self, card: ElementRef) -> Option<CardFields> {
        let name = first_text_in(card, self.registry.candidates_for(Role::Name))?;
        let href = first_match(self.registry.candidates_for(Role::ProfileLink), |selector| {
            let sel = compile(selector)?;
            let href = card.select(&sel).next()?.value().attr("href")?;
            self.urls.is_profile_url(href).then(|| href.to_string())
        });
        Some(CardFields {
            name,
            subtitle: first_text_in(card, self.registry.candidates_for(Role::Title))
                .unwrap_or_default(),
            employer: first_text_in(card, self.registry.candidates_for(Role::Employer))
                .unwrap_or_default(),
            href,
            fragment: card.html(),
        })
    }

    /// Generic containers read positionally: name, subtitle, employer.
    pub fn last_resort(&self, markup: &str) -> Vec<ProfileRecord> {
        let doc = Html::parse_document(markup);
        first_match(self.registry.candidates_for(Role::GenericContainer), |selector| {
            let sel = compile(selector)?;
            let records: Vec<ProfileRecord> = doc
                .select(&sel)
                .filter_map(|card| self.read_generic_card(card))
                .filter_map(|fields| self.build_record(fields))
                .collect();
            if !records.is_empty() {
                info!("Generic container {:?} gave {} records", selector, records.len());
            }
            (!records.is_empty()).then_some(records)
        })
        .unwrap_or_default()
    }

    fn read_generic_card(&self, card: ElementRef) -> Option<CardFields> {
        let mut texts = text_nodes(card).into_iter();
        let name = texts.next()?;
        let subtitle = texts.next().unwrap_or_default();
        let employer = texts.next().unwrap_or_default();
        let link = compile("a[href]")?;
        let href = card
            .select(&link)
            .filter_map(|a| a.value().attr("href"))
            .find(|h| self.urls.is_profile_url(h))
            .map(String::from);
        Some(CardFields {
            name,
            subtitle,
            employer,
            href,
            fragment: card.html(),
        })
    }

    /// Organization filter, link fallback and record construction shared by every pass.
    fn build_record(&self, card: CardFields) -> Option<ProfileRecord> {
        let classifier = OrganizationClassifier::new(self.registry, self.urls);
        if classifier.is_organization(&card.name, &card.subtitle, &card.fragment) {
            debug!("Skipping {:?}: organization card", card.name);
            return None;
        }

        let url = card
            .href
            .map(|h| self.urls.normalize(&h))
            .or_else(|| self.urls.find_in_markup(&card.fragment))
            .unwrap_or_default();
        if url.is_empty() {
            warn!("No profile link for {:?}", card.name);
        }

        Some(ProfileRecord::from_listing(
            &card.name,
            &card.subtitle,
            &clean_employer(&card.employer),
            &url,
        ))
    }
}

async fn live_text<B>(
    browser: &mut B,
    card: ElementHandle,
    candidates: &[String],
) -> Result<Option<String>>
where
    B: Browser + ?Sized,
{
    for selector in candidates {
        let Ok(Some(el)) = browser.query(selector, card).await else {
            continue;
        };
        let text = browser.inner_text(el).await?;
        if !text.is_empty() {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Live records keep priority; static records only fill missing links, by position.
pub fn merge_by_position(
    live: Vec<ProfileRecord>,
    fallback: Vec<ProfileRecord>,
) -> Vec<ProfileRecord> {
    if live.is_empty() {
        return fallback;
    }
    live.into_iter()
        .enumerate()
        .map(|(i, mut record)| {
            if !record.has_url() {
                if let Some(other) = fallback.get(i).filter(|o| o.has_url()) {
                    record.linkedin_url = other.linkedin_url.clone();
                }
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ReplayBrowser;
    use crate::error::ScrapeError;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    const LISTING: &str = "https://www.linkedin.com/school/acme/people/";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name))
            .unwrap()
    }

    async fn scan_fixture(name: &str) -> Vec<ProfileRecord> {
        let markup = fixture(name);
        let mut browser = ReplayBrowser::new().with_page(LISTING, markup.clone());
        browser.navigate(LISTING).await.unwrap();
        let registry = SelectorRegistry::default();
        let urls = UrlNormalizer::default();
        ContainerScanner::new(&registry, &urls)
            .scan(&markup, &mut browser)
            .await
    }

    #[tokio::test]
    async fn person_kept_organization_dropped() {
        let records = scan_fixture("listing_people.html").await;
        assert_eq!(records.len(), 1);
        let bob = &records[0];
        assert_eq!(bob.first_name, "Bob");
        assert_eq!(bob.last_name, "Smith");
        assert_eq!(bob.description, "Software Engineer");
        assert_eq!(bob.employer, "Acme Corp");
        assert_eq!(bob.linkedin_url, "https://www.linkedin.com/in/bobsmith");
        assert_eq!(bob.title, "");
    }

    #[tokio::test]
    async fn only_first_matching_container_selector_is_used() {
        let records = scan_fixture("listing_exclusive.html").await;
        let names: Vec<String> = records.iter().map(|r| r.full_name()).collect();
        assert_eq!(names, vec!["Ann Lee", "Ben Ode", "Cara Diaz"]);
    }

    /// Replays a page but fails DOM reads on chosen elements.
    struct Flaky {
        inner: ReplayBrowser,
        /// `outer_html` fails for elements whose markup contains this text.
        broken_card: Option<&'static str>,
        /// Every `inner_text` call fails.
        text_unreadable: bool,
    }

    impl Flaky {
        async fn on(markup: &str) -> Self {
            let mut inner = ReplayBrowser::new().with_page(LISTING, markup);
            inner.navigate(LISTING).await.unwrap();
            Flaky {
                inner,
                broken_card: None,
                text_unreadable: false,
            }
        }
    }

    #[async_trait]
    impl Browser for Flaky {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.inner.navigate(url).await
        }
        async fn content(&mut self) -> Result<String> {
            self.inner.content().await
        }
        async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
            self.inner.query_all(selector).await
        }
        async fn query(
            &mut self,
            selector: &str,
            within: ElementHandle,
        ) -> Result<Option<ElementHandle>> {
            self.inner.query(selector, within).await
        }
        async fn inner_text(&mut self, element: ElementHandle) -> Result<String> {
            if self.text_unreadable {
                return Err(ScrapeError::Dom("node detached".into()));
            }
            self.inner.inner_text(element).await
        }
        async fn attribute(
            &mut self,
            element: ElementHandle,
            name: &str,
        ) -> Result<Option<String>> {
            self.inner.attribute(element, name).await
        }
        async fn outer_html(&mut self, element: ElementHandle) -> Result<String> {
            let html = self.inner.outer_html(element).await?;
            match self.broken_card {
                Some(marker) if html.contains(marker) => {
                    Err(ScrapeError::Dom("stale element".into()))
                }
                _ => Ok(html),
            }
        }
        async fn screenshot(&mut self, path: &Path) -> Result<PathBuf> {
            Ok(path.to_path_buf())
        }
    }

    #[tokio::test]
    async fn element_error_skips_only_that_card() {
        let markup = fixture("listing_exclusive.html");
        let mut browser = Flaky::on(&markup).await;
        browser.broken_card = Some("Ben Ode");
        let registry = SelectorRegistry::default();
        let urls = UrlNormalizer::default();

        let records = ContainerScanner::new(&registry, &urls)
            .scan(&markup, &mut browser)
            .await;
        let names: Vec<String> = records.iter().map(|r| r.full_name()).collect();
        assert_eq!(names, vec!["Ann Lee", "Cara Diaz"]);
    }

    #[tokio::test]
    async fn static_pass_covers_unreadable_live_dom() {
        let markup = fixture("listing_exclusive.html");
        let mut browser = Flaky::on(&markup).await;
        browser.text_unreadable = true;
        let registry = SelectorRegistry::default();
        let urls = UrlNormalizer::default();

        let records = ContainerScanner::new(&registry, &urls)
            .scan(&markup, &mut browser)
            .await;
        let names: Vec<String> = records.iter().map(|r| r.full_name()).collect();
        assert_eq!(names, vec!["Ann Lee", "Ben Ode", "Cara Diaz"]);
        assert!(records.iter().all(|r| r.has_url()));
    }

    #[tokio::test]
    async fn generic_containers_when_nothing_else_matches() {
        let records = scan_fixture("listing_generic.html").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_name(), "Grace Hopper");
        assert_eq!(records[0].description, "Rear Admiral");
        assert_eq!(records[0].employer, "US Navy");
        assert_eq!(records[0].linkedin_url, "https://www.linkedin.com/in/ghopper");
    }

    #[tokio::test]
    async fn scanning_is_repeatable() {
        let strip = |mut records: Vec<ProfileRecord>| {
            records.iter_mut().for_each(|r| r.timestamp.clear());
            records
        };
        let first = strip(scan_fixture("listing_exclusive.html").await);
        let second = strip(scan_fixture("listing_exclusive.html").await);
        assert_eq!(first, second);
    }

    #[test]
    fn static_pass_matches_live_fixture() {
        let registry = SelectorRegistry::default();
        let urls = UrlNormalizer::default();
        let records =
            ContainerScanner::new(&registry, &urls).scan_markup(&fixture("listing_people.html"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].linkedin_url, "https://www.linkedin.com/in/bobsmith");
    }

    #[test]
    fn unrecognized_page_is_empty() {
        let registry = SelectorRegistry::default();
        let urls = UrlNormalizer::default();
        let scanner = ContainerScanner::new(&registry, &urls);
        assert!(scanner.scan_markup("<html><body><p>Sign in</p></body></html>").is_empty());
        assert!(scanner.last_resort("<html><body><p>Sign in</p></body></html>").is_empty());
    }

    #[test]
    fn link_recovered_from_raw_markup() {
        let registry = SelectorRegistry {
            profile_link: vec!["a.never-present".into()],
            ..SelectorRegistry::default()
        };
        let urls = UrlNormalizer::default();
        let markup = r#"<ul><li class="search-result__wrapper">
            <span class="actor-name">Dana Wu</span><p class="subline-level-1">Designer</p>
            <div><a href="/in/dana-wu?trk=srp">open</a></div></li></ul>"#;
        let records = ContainerScanner::new(&registry, &urls).scan_markup(markup);
        assert_eq!(records[0].linkedin_url, "https://www.linkedin.com/in/dana-wu");
    }

    #[test]
    fn merge_keeps_live_and_fills_links() {
        let live = vec![
            ProfileRecord::from_listing("Ann Lee", "Chef", "", ""),
            ProfileRecord::from_listing("Ben Ode", "Pilot", "", "https://www.linkedin.com/in/ben"),
        ];
        let stat = vec![
            ProfileRecord::from_listing(
                "Ann Lee",
                "Head Chef",
                "Bistro",
                "https://www.linkedin.com/in/ann",
            ),
            ProfileRecord::from_listing(
                "Ben Ode",
                "Pilot",
                "",
                "https://www.linkedin.com/in/other",
            ),
        ];
        let merged = merge_by_position(live, stat);
        assert_eq!(merged[0].linkedin_url, "https://www.linkedin.com/in/ann");
        assert_eq!(merged[0].description, "Chef");
        assert_eq!(merged[0].employer, "");
        assert_eq!(merged[1].linkedin_url, "https://www.linkedin.com/in/ben");
    }

    #[test]
    fn merge_with_empty_live_takes_static() {
        let stat = vec![ProfileRecord::from_listing("Ann Lee", "Chef", "", "")];
        assert_eq!(merge_by_position(Vec::new(), stat.clone()), stat);
    }
}
