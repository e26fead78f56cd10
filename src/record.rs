use chrono::Local;
use serde::{Deserialize, Serialize};

/// Column order used by the CSV sink.
pub const FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "title",
    "description",
    "employer",
    "linkedin_url",
    "timestamp",
];

/// One person extracted from a listing page, optionally enriched by a profile visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub first_name: String,
    pub last_name: String,
    /// Authoritative title, only set after a profile visit.
    pub title: String,
    /// Subtitle as shown on the listing card.
    pub description: String,
    pub employer: String,
    pub linkedin_url: String,
    pub timestamp: String,
}

impl ProfileRecord {
    /// Build a listing-stage record; `title` stays empty until a visit resolves it.
    pub fn from_listing(name: &str, subtitle: &str, employer: &str, url: &str) -> Self {
        let (first_name, last_name) = split_name(name);
        ProfileRecord {
            first_name,
            last_name,
            title: String::new(),
            description: subtitle.to_string(),
            employer: employer.to_string(),
            linkedin_url: url.to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn has_url(&self) -> bool {
        !self.linkedin_url.is_empty()
    }

    /// Overwrite title/employer with non-empty values only. Returns whether anything changed.
    pub fn upgrade(&mut self, title: &str, employer: &str) -> bool {
        let mut changed = false;
        if !title.is_empty() && self.title != title {
            self.title = title.to_string();
            changed = true;
        }
        if !employer.is_empty() && self.employer != employer {
            self.employer = employer.to_string();
            changed = true;
        }
        changed
    }

    /// Values in `FIELDS` order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.first_name.clone(),
            self.last_name.clone(),
            self.title.clone(),
            self.description.clone(),
            self.employer.clone(),
            self.linkedin_url.clone(),
            self.timestamp.clone(),
        ]
    }
}

/// First whitespace token is the first name, the rest joined by single spaces is the last name.
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}
