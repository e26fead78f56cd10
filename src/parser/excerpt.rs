use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use super::profile::FieldHints;
use super::truncate_chars;
use super::{normalize_ws, visible_text};

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap());
static SVG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<svg\b.*?</svg\s*>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static ATTR_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"=\s*("[^"]*"|'[^']*')"#).unwrap());
static GAP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\[<{(].*[\]>})]$").unwrap());

/// Literal the model is told to answer when a value is absent.
pub const NOT_FOUND: &str = "NOT FOUND";

const EMPTY_TOKENS: &[&str] = &["not found", "none", "n/a", "na", "unknown", "null", "-"];

#[derive(Debug, Clone, Copy)]
pub struct ExcerptLimits {
    pub max_chars: usize,
    pub max_attribute_len: usize,
}

impl Default for ExcerptLimits {
    fn default() -> Self {
        ExcerptLimits {
            max_chars: 12_000,
            max_attribute_len: 80,
        }
    }
}

/// Size-bounded markup sent to the model, plus its visible text for grounding.
#[derive(Debug, Clone)]
pub struct Excerpt {
    pub markup: String,
    text: String,
}

impl Excerpt {
    pub fn prepare(markup: &str, limits: &ExcerptLimits) -> Self {
        let cleaned = SCRIPT_RE.replace_all(markup, "");
        let cleaned = STYLE_RE.replace_all(&cleaned, "");
        let cleaned = SVG_RE.replace_all(&cleaned, "");
        let cleaned = COMMENT_RE.replace_all(&cleaned, "");
        let cleaned = ATTR_VALUE_RE.replace_all(&cleaned, |caps: &regex::Captures| {
            let quoted = &caps[1];
            let quote = &quoted[..1];
            let value = &quoted[1..quoted.len() - 1];
            format!("={}{}{}", quote, truncate_chars(value, limits.max_attribute_len), quote)
        });
        let cleaned = GAP_RE.replace_all(&cleaned, "><");

        // Profile content lives in <main>; the page chrome before it is noise.
        let start = cleaned
            .find("<main")
            .or_else(|| cleaned.find("<body"))
            .unwrap_or(0);
        let markup = truncate_chars(cleaned[start..].trim(), limits.max_chars).to_string();

        let text = visible_text(Html::parse_fragment(&markup).root_element()).to_lowercase();
        Excerpt { markup, text }
    }

    /// Whether `value` is text actually shown in the excerpt.
    pub fn contains(&self, value: &str) -> bool {
        let needle = normalize_ws(value).to_lowercase();
        !needle.is_empty() && self.text.contains(&needle)
    }
}

pub fn build_prompt(excerpt: &Excerpt, hints: &FieldHints) -> String {
    let mut prompt = String::from(
        "Extract the CURRENT job title and the CURRENT employer of the person whose \
         profile page is shown in the HTML below.\n\
         Rules:\n\
         - Copy each value exactly as it appears in the HTML text. Do not paraphrase, translate or guess.\n",
    );
    prompt.push_str(&format!(
        "- If a value does not appear in the HTML, answer {} for it.\n",
        NOT_FOUND
    ));
    if let Some(hint) = hints.title.as_deref().filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!(
            "- The job title is expected near text containing \"{}\"; search there first.\n",
            hint.trim()
        ));
    }
    if let Some(hint) = hints.employer.as_deref().filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!(
            "- The employer is expected near text containing \"{}\"; search there first.\n",
            hint.trim()
        ));
    }
    prompt.push_str("Answer with exactly two lines and nothing else:\ntitle: <value>\nemployer: <value>\n\nHTML:\n");
    prompt.push_str(&excerpt.markup);
    prompt
}

/// Values proposed by the model, after placeholder and sentinel rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiFields {
    pub title: Option<String>,
    pub employer: Option<String>,
}

pub fn parse_response(response: &str) -> AiFields {
    let mut fields = AiFields::default();
    for line in response.lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('*').to_lowercase();
        let Some(value) = accepted_value(value) else {
            continue;
        };
        match key.as_str() {
            "title" | "job title" | "current title" if fields.title.is_none() => {
                fields.title = Some(value)
            }
            "employer" | "company" | "current employer" if fields.employer.is_none() => {
                fields.employer = Some(value)
            }
            _ => {}
        }
    }
    fields
}

fn accepted_value(raw: &str) -> Option<String> {
    let value = normalize_ws(raw.trim().trim_matches(['"', '\'', '`']));
    let token = value.trim_end_matches('.').to_lowercase();
    if value.is_empty()
        || EMPTY_TOKENS.contains(&token.as_str())
        || PLACEHOLDER_RE.is_match(&value)
    {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_noise_and_long_attributes() {
        let markup = r#"<html><head><style>.a{}</style></head><body><!-- tracking -->
            <script>var secret = 1;</script>
            <main><img src="data:image/png;base64,AAAAAAAAAAAAAAAAAAAA"><h1>Jane Doe</h1></main></body></html>"#;
        let excerpt = Excerpt::prepare(
            markup,
            &ExcerptLimits {
                max_chars: 1000,
                max_attribute_len: 10,
            },
        );
        assert!(excerpt.markup.starts_with("<main>"));
        assert!(!excerpt.markup.contains("secret"));
        assert!(!excerpt.markup.contains("tracking"));
        assert!(excerpt.markup.contains(r#"src="data:image""#));
        assert!(excerpt.contains("jane  DOE"));
        assert!(!excerpt.contains("secret"));
    }

    #[test]
    fn excerpt_is_size_bounded() {
        let markup = format!("<main><p>{}</p></main>", "é".repeat(500));
        let excerpt = Excerpt::prepare(
            &markup,
            &ExcerptLimits {
                max_chars: 50,
                max_attribute_len: 10,
            },
        );
        assert_eq!(excerpt.markup.chars().count(), 50);
    }

    #[test]
    fn hints_augment_the_prompt() {
        let excerpt = Excerpt::prepare("<main>x</main>", &ExcerptLimits::default());
        let plain = build_prompt(&excerpt, &FieldHints::default());
        assert!(!plain.contains("expected near"));
        let hinted = build_prompt(
            &excerpt,
            &FieldHints {
                title: Some("Engineer".into()),
                employer: None,
            },
        );
        assert!(hinted.contains("near text containing \"Engineer\""));
        assert!(hinted.contains(NOT_FOUND));
    }

    #[test]
    fn parses_key_value_lines() {
        let fields =
            parse_response("Title: Staff Engineer\n**Employer**: \"Acme Corp\"\nnotes: whatever");
        assert_eq!(fields.title.as_deref(), Some("Staff Engineer"));
        assert_eq!(fields.employer.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn rejects_sentinels_and_placeholders() {
        for response in [
            "title: NOT FOUND\nemployer: N/A",
            "title: [job title]\nemployer: <value>",
            "title: none.\nemployer: Unknown",
            "no structured answer here",
        ] {
            assert_eq!(parse_response(response), AiFields::default(), "{}", response);
        }
    }
}
