use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;

static PROFILE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href\s*=\s*["']((?:https?://[^"'/]+)?/in/[^"'\s]+)["']"#).unwrap()
});

/// Validates and canonicalizes profile links against one site origin.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    origin: Url,
    profile_markers: Vec<String>,
    organization_markers: Vec<String>,
}

impl UrlNormalizer {
    pub fn new(origin: &str) -> Self {
        let origin = Url::parse(origin)
            .unwrap_or_else(|_| Url::parse("https://www.linkedin.com").expect("static origin"));
        UrlNormalizer {
            origin,
            profile_markers: vec!["/in/".into()],
            organization_markers: vec![
                "/company/".into(),
                "/school/".into(),
                "/showcase/".into(),
                "/groups/".into(),
            ],
        }
    }

    pub fn is_organization_url(&self, candidate: &str) -> bool {
        self.organization_markers.iter().any(|m| candidate.contains(m.as_str()))
    }

    /// Person profile link: carries a profile marker and no organization marker.
    pub fn is_profile_url(&self, candidate: &str) -> bool {
        !self.is_organization_url(candidate)
            && self.profile_markers.iter().any(|m| candidate.contains(m.as_str()))
    }

    /// Strip query/fragment and make absolute against the origin.
    ///
    /// Never fails: a candidate that is neither absolute nor root-relative comes
    /// back untouched, which downstream treats as unresolved.
    pub fn normalize(&self, candidate: &str) -> String {
        let trimmed = candidate.trim();
        let parsed = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Url::parse(trimmed).ok()
        } else if trimmed.starts_with('/') {
            self.origin.join(trimmed).ok()
        } else {
            None
        };

        match parsed {
            Some(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            }
            None => {
                warn!("Could not normalize link candidate {:?}", candidate);
                candidate.to_string()
            }
        }
    }

    /// Last-resort link recovery: first profile-path href anywhere in raw markup.
    pub fn find_in_markup(&self, markup: &str) -> Option<String> {
        PROFILE_HREF_RE
            .captures_iter(markup)
            .map(|caps| caps[1].replace("&amp;", "&"))
            .find(|href| self.is_profile_url(href))
            .map(|href| self.normalize(&href))
    }
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        UrlNormalizer::new("https://www.linkedin.com")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_profile_gets_origin() {
        let n = UrlNormalizer::default();
        assert_eq!(
            n.normalize("/in/bobsmith?miniProfileUrn=abc"),
            "https://www.linkedin.com/in/bobsmith"
        );
    }

    #[test]
    fn absolute_only_loses_query() {
        let n = UrlNormalizer::default();
        assert_eq!(
            n.normalize("https://www.linkedin.com/in/jane-doe-123/?trk=people#about"),
            "https://www.linkedin.com/in/jane-doe-123/"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = UrlNormalizer::default();
        for raw in [
            "/in/bobsmith",
            "/in/bobsmith?x=1",
            "https://www.linkedin.com/in/a-b/?trk=x",
            "http://linkedin.com/in/c",
            "in/relative-without-slash",
            "javascript:void(0)",
        ] {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn malformed_candidate_is_returned_unchanged() {
        let n = UrlNormalizer::default();
        assert_eq!(n.normalize("in/bob?x=1"), "in/bob?x=1");
    }

    #[test]
    fn organization_marker_always_loses() {
        let n = UrlNormalizer::default();
        assert!(n.is_profile_url("/in/bob"));
        assert!(!n.is_profile_url("/company/acme"));
        assert!(!n.is_profile_url("https://www.linkedin.com/school/x/people/?in/=1"));
        assert!(!n.is_profile_url("/in/bob/company/acme"));
    }

    #[test]
    fn finds_profile_href_in_raw_markup() {
        let n = UrlNormalizer::default();
        let html = r#"<a href="/school/stanford/">S</a><div><a href="/in/carol-chen?trk=x&amp;y=1">Carol</a></div>"#;
        assert_eq!(
            n.find_in_markup(html).as_deref(),
            Some("https://www.linkedin.com/in/carol-chen")
        );
        assert!(n.find_in_markup("<p>no links</p>").is_none());
    }

    #[test]
    fn custom_origin() {
        let n = UrlNormalizer::new("https://staging.example.test/");
        assert_eq!(n.normalize("/in/x"), "https://staging.example.test/in/x");
    }
}
