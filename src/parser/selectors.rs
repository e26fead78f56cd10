//! Ranked CSS selector candidates per semantic role.
//!
//! The target site ships several layout revisions at once, so every role keeps
//! an ordered list of overlapping candidates. Lists are tried most specific
//! first and the first candidate that yields a non-empty match wins. Update
//! the defaults (or override them from the config file) when the markup moves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Listing-page profile card.
    Container,
    Name,
    /// Listing-page subtitle (stored as the record description).
    Title,
    Employer,
    ProfileLink,
    /// Last-resort card containers when no known container matches.
    GenericContainer,
    /// Profile page: one entry of the experience section.
    ExperienceEntry,
    /// Profile page: date range inside an experience entry.
    DateRange,
    /// Profile page: title inside an experience entry.
    PositionTitle,
    /// Profile page: employer inside an experience entry.
    PositionEmployer,
    Headline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorRegistry {
    pub container: Vec<String>,
    pub name: Vec<String>,
    pub title: Vec<String>,
    pub employer: Vec<String>,
    pub profile_link: Vec<String>,
    pub generic_container: Vec<String>,
    pub experience_entry: Vec<String>,
    pub date_range: Vec<String>,
    pub position_title: Vec<String>,
    pub position_employer: Vec<String>,
    pub headline: Vec<String>,
    pub organization_keywords: Vec<String>,
    /// Whole-subtitle labels that only organization cards carry.
    pub organization_subtitles: Vec<String>,
    pub follow_markers: Vec<String>,
    pub connection_markers: Vec<String>,
    /// Date-range words marking an open-ended (current) position.
    pub current_markers: Vec<String>,
}

impl SelectorRegistry {
    pub fn candidates_for(&self, role: Role) -> &[String] {
        match role {
            Role::Container => &self.container,
            Role::Name => &self.name,
            Role::Title => &self.title,
            Role::Employer => &self.employer,
            Role::ProfileLink => &self.profile_link,
            Role::GenericContainer => &self.generic_container,
            Role::ExperienceEntry => &self.experience_entry,
            Role::DateRange => &self.date_range,
            Role::PositionTitle => &self.position_title,
            Role::PositionEmployer => &self.position_employer,
            Role::Headline => &self.headline,
        }
    }

    pub fn organization_keywords(&self) -> &[String] {
        &self.organization_keywords
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        SelectorRegistry {
            container: owned(&[
                ".search-result__wrapper",
                ".reusable-search__result-container",
                ".org-people-profile-card",
                ".search-result__occluded-item",
                "li.reusable-search__result-container",
            ]),
            name: owned(&[
                ".actor-name",
                ".entity-result__title-text a",
                ".artdeco-entity-lockup__title",
                ".org-people-profile-card__profile-title",
                ".search-result__title",
                ".pv-entity__title",
            ]),
            title: owned(&[
                ".search-result__info .subline-level-1",
                ".entity-result__primary-subtitle",
                ".artdeco-entity-lockup__subtitle",
                ".subline-level-1",
                ".search-result__subtitle",
                ".pv-entity__secondary-title",
            ]),
            employer: owned(&[
                ".search-result__info .subline-level-2",
                ".entity-result__secondary-subtitle",
                ".artdeco-entity-lockup__caption",
                ".subline-level-2",
            ]),
            profile_link: owned(&[
                "a.app-aware-link",
                ".actor-name a",
                ".entity-result__title-text a",
                ".artdeco-entity-lockup__title a",
                "a.ember-view",
                "a[data-control-name='search_srp_result']",
                "a[href*='/in/']",
            ]),
            generic_container: owned(&[
                ".search-result__info",
                ".pv-browsemap-section__member-container",
                ".org-people-profiles-module__profile-item",
                ".result-card",
                "li.artdeco-list__item",
                ".artdeco-entity-lockup",
                ".artdeco-card",
                ".profile-content",
            ]),
            experience_entry: owned(&[
                "section#experience-section li.pv-entity__position-group-pager",
                "section.experience-section li",
                "#experience ~ .pvs-list__outer-container li.artdeco-list__item",
                "section[data-section='experience'] li",
                ".pv-profile-section__list-item",
                ".pv-position-entity",
            ]),
            date_range: owned(&[
                ".pv-entity__date-range",
                ".date-range",
                ".pvs-entity__caption-wrapper",
                "span.t-black--light",
                "time",
            ]),
            position_title: owned(&[
                ".pv-entity__summary-info h3",
                "[data-field='experience_position_title']",
                ".t-bold span[aria-hidden='true']",
                ".t-bold",
                "h3",
            ]),
            position_employer: owned(&[
                ".pv-entity__secondary-title",
                "[data-field='experience_company_name']",
                ".pv-entity__company-summary-info h3",
                ".pv-entity__company-summary-info span:not(.visually-hidden)",
                ".t-14.t-normal span[aria-hidden='true']",
            ]),
            headline: owned(&[
                "div.text-body-medium",
                ".pv-top-card--list .text-body-medium",
                ".top-card-layout__headline",
                ".pv-top-card-section__headline",
                "h2.top-card__subline-item",
            ]),
            organization_keywords: owned(&[
                "university",
                "school",
                "college",
                "institute",
                "academy",
                "online",
                "follow",
                "group",
                "department",
                "subsidiary",
                "service",
                "learning",
                "foundation",
                "association",
            ]),
            organization_subtitles: owned(&[
                "higher education",
                "education",
                "education administration programs",
                "e-learning",
                "company",
                "computer software",
                "information technology & services",
                "internet",
                "non-profit organization management",
                "research",
            ]),
            follow_markers: owned(&[
                "follow-button",
                ">follow<",
                ">+ follow<",
                "aria-label=\"follow",
                "followers",
            ]),
            connection_markers: owned(&[
                "connection",
                ">connect<",
                "to connect",
                "aria-label=\"invite",
                "dist-value",
                "member-insights",
            ]),
            current_markers: owned(&["present", "current"]),
        }
    }
}
