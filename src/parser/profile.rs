use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::excerpt::{build_prompt, parse_response, AiFields, Excerpt, ExcerptLimits};
use super::selectors::{Role, SelectorRegistry};
use super::{clean_employer, compile, first_match, first_text_in};
use crate::completion::TextCompletion;

/// Which cascade step produced a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    DirectSelector,
    StructuralHeuristic,
    AiAssisted,
    Headline,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtraction {
    pub value: String,
    pub source: FieldSource,
}

impl FieldExtraction {
    fn unresolved() -> Self {
        FieldExtraction {
            value: String::new(),
            source: FieldSource::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFields {
    pub title: FieldExtraction,
    pub employer: FieldExtraction,
}

/// Text expected near the target values; only steers the AI prompt.
#[derive(Debug, Clone, Default)]
pub struct FieldHints {
    pub title: Option<String>,
    pub employer: Option<String>,
}

/// Heuristic candidates for one page, gathered in a single parse.
#[derive(Debug, Default)]
struct PageCandidates {
    structural_title: Option<String>,
    structural_employer: Option<String>,
    direct_title: Option<String>,
    direct_employer: Option<String>,
    headline: Option<String>,
}

/// Resolves the current title and employer of a profile page.
///
/// Per field, the first non-empty step wins: AI-assisted (when a completion
/// service is present), the open-ended experience entry, the first experience
/// entry, and for the title the headline. Nothing is ever invented: an
/// unresolved field comes back empty with `FieldSource::None`.
pub struct ProfileFieldResolver<'a> {
    registry: &'a SelectorRegistry,
    completion: Option<&'a dyn TextCompletion>,
    limits: ExcerptLimits,
}

impl<'a> ProfileFieldResolver<'a> {
    pub fn new(
        registry: &'a SelectorRegistry,
        completion: Option<&'a dyn TextCompletion>,
        limits: ExcerptLimits,
    ) -> Self {
        ProfileFieldResolver {
            registry,
            completion,
            limits,
        }
    }

    pub async fn resolve(&self, markup: &str, hints: &FieldHints) -> ResolvedFields {
        let ai = match self.completion {
            Some(service) => self.ai_fields(service, markup, hints).await,
            None => AiFields::default(),
        };
        let page = self.page_candidates(markup);

        let title = pick(&[
            (ai.title, FieldSource::AiAssisted),
            (page.structural_title, FieldSource::StructuralHeuristic),
            (page.direct_title, FieldSource::DirectSelector),
            (page.headline, FieldSource::Headline),
        ]);
        let employer = pick(&[
            (ai.employer.map(|e| clean_employer(&e)), FieldSource::AiAssisted),
            (page.structural_employer, FieldSource::StructuralHeuristic),
            (page.direct_employer, FieldSource::DirectSelector),
        ]);

        debug!(
            "Resolved title {:?} via {:?}, employer {:?} via {:?}",
            title.value, title.source, employer.value, employer.source
        );
        ResolvedFields { title, employer }
    }

    async fn ai_fields(
        &self,
        service: &dyn TextCompletion,
        markup: &str,
        hints: &FieldHints,
    ) -> AiFields {
        let excerpt = Excerpt::prepare(markup, &self.limits);
        let prompt = build_prompt(&excerpt, hints);
        let response = match service.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("AI-assisted extraction failed, using heuristics: {}", e);
                return AiFields::default();
            }
        };

        let proposed = parse_response(&response);
        let grounded = |value: Option<String>, field: &str| {
            value.filter(|v| {
                let found = excerpt.contains(v);
                if !found {
                    warn!("Discarding AI {} {:?}: not present on the page", field, v);
                }
                found
            })
        };
        AiFields {
            title: grounded(proposed.title, "title"),
            employer: grounded(proposed.employer, "employer"),
        }
    }

    fn page_candidates(&self, markup: &str) -> PageCandidates {
        let doc = Html::parse_document(markup);
        let root = doc.root_element();
        let (structural_title, structural_employer) = self.current_position(root);
        let (direct_title, direct_employer) = self.first_position(root);

        PageCandidates {
            structural_title,
            structural_employer,
            direct_title,
            direct_employer,
            headline: first_text_in(root, self.registry.candidates_for(Role::Headline)),
        }
    }

    /// Title and employer inside the first experience entry with an open-ended date range.
    fn current_position(&self, root: ElementRef) -> (Option<String>, Option<String>) {
        let entry = first_match(self.registry.candidates_for(Role::ExperienceEntry), |sel| {
            let sel = compile(sel)?;
            root.select(&sel).find(|entry| self.is_current(*entry))
        });
        match entry {
            Some(entry) => self.position_in(entry),
            None => (None, None),
        }
    }

    /// Title and employer of the first entry of the first matching experience list.
    fn first_position(&self, root: ElementRef) -> (Option<String>, Option<String>) {
        let entry = first_match(self.registry.candidates_for(Role::ExperienceEntry), |sel| {
            let sel = compile(sel)?;
            root.select(&sel).next()
        });
        match entry {
            Some(entry) => self.position_in(entry),
            None => (None, None),
        }
    }

    fn position_in(&self, entry: ElementRef) -> (Option<String>, Option<String>) {
        let title = first_text_in(entry, self.registry.candidates_for(Role::PositionTitle));
        let employer = first_text_in(entry, self.registry.candidates_for(Role::PositionEmployer))
            .map(|e| clean_employer(&e))
            .filter(|e| !e.is_empty());
        (title, employer)
    }

    fn is_current(&self, entry: ElementRef) -> bool {
        let Some(dates) = first_text_in(entry, self.registry.candidates_for(Role::DateRange)) else {
            return false;
        };
        let dates = dates.to_lowercase();
        self.registry
            .current_markers
            .iter()
            .any(|m| dates.contains(&m.to_lowercase()))
    }
}

fn pick(steps: &[(Option<String>, FieldSource)]) -> FieldExtraction {
    first_match(steps, |(value, source)| {
        value
            .as_ref()
            .filter(|v| !v.is_empty())
            .map(|v| FieldExtraction {
                value: v.clone(),
                source: *source,
            })
    })
    .unwrap_or_else(FieldExtraction::unresolved)
}
