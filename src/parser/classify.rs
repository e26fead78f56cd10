use std::sync::LazyLock;

use regex::Regex;

use super::selectors::SelectorRegistry;
use super::urls::UrlNormalizer;

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).unwrap());
static LOGO_IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\b[^>]*\balt\s*=\s*["'][^"']*logo[^"']*["']"#).unwrap());
static TAG_GAP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+|\s+<").unwrap());

/// Which heuristic flagged a card as an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgSignal {
    NameKeyword,
    FollowWithoutConnect,
    NameShape,
    Subtitle,
    OrganizationLink,
    LogoImage,
}

/// Person-vs-organization filter for listing cards.
///
/// Signals are cheap and independent; they run in a fixed order and the first
/// hit decides. Misclassifying an unusual personal name is accepted.
pub struct OrganizationClassifier<'a> {
    registry: &'a SelectorRegistry,
    urls: &'a UrlNormalizer,
}

impl<'a> OrganizationClassifier<'a> {
    pub fn new(registry: &'a SelectorRegistry, urls: &'a UrlNormalizer) -> Self {
        OrganizationClassifier { registry, urls }
    }

    pub fn is_organization(&self, name: &str, subtitle: &str, fragment: &str) -> bool {
        self.signal(name, subtitle, fragment).is_some()
    }

    pub fn signal(&self, name: &str, subtitle: &str, fragment: &str) -> Option<OrgSignal> {
        let lower_name = name.to_lowercase();
        if self
            .registry
            .organization_keywords()
            .iter()
            .any(|kw| lower_name.contains(&kw.to_lowercase()))
        {
            return Some(OrgSignal::NameKeyword);
        }

        let markup = compact_markup(fragment);
        let follows = contains_any(&markup, &self.registry.follow_markers);
        let connects = contains_any(&markup, &self.registry.connection_markers);
        if follows && !connects {
            return Some(OrgSignal::FollowWithoutConnect);
        }

        let tokens = name.split_whitespace().count();
        if !(2..=4).contains(&tokens) {
            return Some(OrgSignal::NameShape);
        }

        let subtitle = subtitle.trim().to_lowercase();
        if subtitle.is_empty()
            || self
                .registry
                .organization_keywords()
                .iter()
                .chain(self.registry.organization_subtitles.iter())
                .any(|kw| subtitle == kw.to_lowercase())
        {
            return Some(OrgSignal::Subtitle);
        }

        if let Some(link) = self.primary_link(fragment) {
            if self.urls.is_organization_url(&link) {
                return Some(OrgSignal::OrganizationLink);
            }
        }

        if LOGO_IMG_RE.is_match(fragment) {
            return Some(OrgSignal::LogoImage);
        }

        None
    }

    /// The card's first link that points at either a person or an organization.
    fn primary_link(&self, fragment: &str) -> Option<String> {
        HREF_RE
            .captures_iter(fragment)
            .map(|c| c[1].to_string())
            .find(|href| self.urls.is_organization_url(href) || self.urls.is_profile_url(href))
    }
}

/// Lowercased markup with whitespace around tags removed, so `> Follow <` reads `>follow<`.
fn compact_markup(fragment: &str) -> String {
    let lower = fragment.to_lowercase();
    let squeezed = TAG_GAP_RE.replace_all(&lower, |caps: &regex::Captures| {
        let edge = if caps[0].starts_with('>') { ">" } else { "<" };
        edge.to_string()
    });
    squeezed.to_string()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, subtitle: &str, fragment: &str) -> Option<OrgSignal> {
        let reg = SelectorRegistry::default();
        let urls = UrlNormalizer::default();
        OrganizationClassifier::new(&reg, &urls).signal(name, subtitle, fragment)
    }

    #[test]
    fn university_name_is_organization() {
        let reg = SelectorRegistry::default();
        let urls = UrlNormalizer::default();
        let c = OrganizationClassifier::new(&reg, &urls);
        assert!(c.is_organization("Stanford University", "", ""));
        assert_eq!(check("Stanford University", "", ""), Some(OrgSignal::NameKeyword));
    }

    #[test]
    fn connected_person_is_not_organization() {
        let fragment = r#"<div><a href="/in/janedoe">Jane Doe</a>
            <span class="member-insights">500+ connections</span></div>"#;
        assert_eq!(check("Jane Doe", "Product Manager", fragment), None);
    }

    #[test]
    fn follow_without_connect() {
        let fragment = r#"<div><a href="/company/acme">Acme</a><button> Follow </button></div>"#;
        assert_eq!(
            check("Acme Widgets", "Manufacturing", fragment),
            Some(OrgSignal::FollowWithoutConnect)
        );
    }

    #[test]
    fn follow_with_connect_is_not_decisive() {
        let fragment = r#"<div><button>Follow</button><button aria-label="Invite Jo Park to connect">Connect</button></div>"#;
        assert_eq!(check("Jo Park", "Designer", fragment), None);
    }

    #[test]
    fn name_token_range() {
        assert_eq!(check("Madonna", "Singer", ""), Some(OrgSignal::NameShape));
        assert_eq!(check("A B C D E", "Singer", ""), Some(OrgSignal::NameShape));
        assert_eq!(check("Ana María de la", "Singer", ""), None);
    }

    #[test]
    fn subtitle_signal() {
        assert_eq!(check("Acme Widgets", "", ""), Some(OrgSignal::Subtitle));
        assert_eq!(check("Acme Widgets", "Higher Education", ""), Some(OrgSignal::Subtitle));
        assert_eq!(check("Jane Doe", "Student at Stanford University", ""), None);
    }

    #[test]
    fn organization_link_signal() {
        let fragment = r#"<a href="https://www.linkedin.com/company/acme-widgets/">Acme</a>"#;
        assert_eq!(
            check("Acme Widgets", "Manufacturing", fragment),
            Some(OrgSignal::OrganizationLink)
        );
    }

    #[test]
    fn logo_image_signal() {
        let fragment = r##"<img src="x.png" alt="Acme Widgets logo"><a href="#">Acme</a>"##;
        assert_eq!(check("Acme Widgets", "Manufacturing", fragment), Some(OrgSignal::LogoImage));
    }

    #[test]
    fn priority_order_first_hit_wins() {
        // Keyword beats every later signal.
        let fragment = r#"<button>Follow</button><img alt="logo">"#;
        assert_eq!(check("Online Learning", "", fragment), Some(OrgSignal::NameKeyword));
    }
}
