//! The mandatory privacy scrubber: every outbound swarm payload and every
//! piece of text System 2 considers "published" passes through `scrub()`
//! first. Rules apply in priority order and replace matches with a labeled
//! redaction marker so the category of what was removed stays legible.

use super::rules::{self, Category, Platform, Rule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Byte range `[start, end)` of a redaction marker within the final
/// scrubbed text, per §4.8's `redactions: [{category, label, span}]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrubMatch {
    pub label: String,
    pub category: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrubResult {
    pub text: String,
    pub matches: Vec<ScrubMatch>,
}

/// A scrubber restricted to a subset of categories, as produced by
/// `create_scoped_scrubber`. The default (unscoped) scrubber applies every
/// rule in `ALL_RULES`.
pub struct Scrubber {
    platform: Platform,
    categories: Option<HashSet<Category>>,
}

impl Default for Scrubber {
    fn default() -> Self {
        Self {
            platform: Platform::Any,
            categories: None,
        }
    }
}

impl Scrubber {
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            categories: None,
        }
    }

    fn applicable_rules(&self) -> impl Iterator<Item = &'static Rule> {
        rules::ALL_RULES.iter().filter(move |rule| {
            let platform_ok = matches!(rule.platform, Platform::Any) || rule.platform == self.platform;
            let category_ok = self
                .categories
                .as_ref()
                .map(|cats| cats.contains(&rule.category))
                .unwrap_or(true);
            platform_ok && category_ok
        })
    }

    /// Apply every applicable rule, in ascending priority order, replacing
    /// each match with `[REDACTED:<label>]` and recording the byte span the
    /// marker ends up at in the final scrubbed text.
    pub fn scrub(&self, text: &str) -> ScrubResult {
        let mut current = text.to_string();
        let mut matches: Vec<ScrubMatch> = Vec::new();

        for rule in self.applicable_rules() {
            let replacement = format!("[REDACTED:{}]", rule.label);
            let mut ops: Vec<(usize, usize, usize)> = Vec::new(); // (orig_start, orig_end, replacement_len)
            let mut out = String::with_capacity(current.len());
            let mut last = 0;
            let mut new_spans: Vec<Span> = Vec::new();

            for m in rule.regex.find_iter(&current) {
                out.push_str(&current[last..m.start()]);
                let span_start = out.len();
                out.push_str(&replacement);
                let span_end = out.len();
                new_spans.push(Span { start: span_start, end: span_end });
                ops.push((m.start(), m.end(), replacement.len()));
                last = m.end();
            }

            if ops.is_empty() {
                continue;
            }
            out.push_str(&current[last..]);

            // Existing spans refer to positions in `current`; shift each by
            // the net length delta of every op this rule applied before it.
            for existing in matches.iter_mut() {
                let mut delta: isize = 0;
                for &(orig_start, orig_end, rlen) in &ops {
                    if orig_end <= existing.span.start {
                        delta += rlen as isize - (orig_end - orig_start) as isize;
                    } else {
                        break;
                    }
                }
                existing.span.start = (existing.span.start as isize + delta) as usize;
                existing.span.end = (existing.span.end as isize + delta) as usize;
            }

            for span in new_spans {
                matches.push(ScrubMatch {
                    label: rule.label.to_string(),
                    category: format!("{:?}", rule.category),
                    span,
                });
            }

            current = out;
        }

        matches.sort_by_key(|m| m.span.start);
        ScrubResult { text: current, matches }
    }

    /// Re-run every rule against already-scrubbed text. Any residual match
    /// means a rule caught something a prior pass introduced or missed;
    /// callers that require a hard guarantee (e.g. before a swarm upload)
    /// treat a non-empty result as a fatal `ScrubResidual` error.
    pub fn validate_scrubbed(&self, text: &str) -> Vec<ScrubMatch> {
        let mut residual: Vec<ScrubMatch> = self
            .applicable_rules()
            .flat_map(|rule| {
                rule.regex.find_iter(text).map(move |m| ScrubMatch {
                    label: rule.label.to_string(),
                    category: format!("{:?}", rule.category),
                    span: Span { start: m.start(), end: m.end() },
                })
            })
            .collect();
        residual.sort_by_key(|m| m.span.start);
        residual
    }
}

/// Build a scrubber limited to the given categories, for callers that only
/// need e.g. credential scrubbing without touching personal-data rules.
pub fn create_scoped_scrubber(categories: &[Category], platform: Platform) -> Scrubber {
    Scrubber {
        platform,
        categories: Some(categories.iter().copied().collect()),
    }
}

pub fn scrub(text: &str) -> ScrubResult {
    Scrubber::default().scrub(text)
}

pub fn validate_scrubbed(text: &str) -> Vec<ScrubMatch> {
    Scrubber::default().validate_scrubbed(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_an_api_key() {
        let result = scrub("use key sk-ant-REDACTED to authenticate");
        assert!(result.text.contains("[REDACTED:anthropic_api_key]"));
        assert!(!result.text.contains("sk-ant-"));
    }

    #[test]
    fn scrubs_email_and_ip() {
        let result = scrub("contact me at jane@example.com from 10.0.0.1");
        assert!(result.text.contains("[REDACTED:email_address]"));
        assert!(result.text.contains("[REDACTED:ipv4_address]"));
    }

    #[test]
    fn spans_point_at_the_redaction_markers_in_the_final_text() {
        let result = scrub("my key is sk-ant-REDACTED; contact me at a@b.com");
        for m in &result.matches {
            let marker = format!("[REDACTED:{}]", m.label);
            assert_eq!(&result.text[m.span.start..m.span.end], marker);
        }
        assert_eq!(result.matches.len(), 2);
    }

    #[test]
    fn spans_stay_correct_across_two_matches_of_the_same_rule() {
        let result = scrub("keys: sk-ant-REDACTED and sk-ant-REDACTED");
        assert_eq!(result.matches.len(), 2);
        for m in &result.matches {
            let marker = format!("[REDACTED:{}]", m.label);
            assert_eq!(&result.text[m.span.start..m.span.end], marker);
        }
    }

    #[test]
    fn earlier_replacement_shift_does_not_corrupt_a_later_rules_span() {
        // The anthropic-key marker is shorter than the key it replaces, so
        // the email match further along must land at a shifted offset.
        let result = scrub("my key is sk-ant-REDACTED; contact me at a@b.com");
        let email = result.matches.iter().find(|m| m.label == "email_address").unwrap();
        assert_eq!(&result.text[email.span.start..email.span.end], "[REDACTED:email_address]");
    }

    #[test]
    fn validate_scrubbed_is_empty_on_clean_text() {
        let result = scrub("fix the typo in line 42");
        let residual = validate_scrubbed(&result.text);
        assert!(residual.is_empty());
    }

    #[test]
    fn validate_scrubbed_flags_residual_secret() {
        let residual = validate_scrubbed("token=sk-ant-REDACTED");
        assert!(!residual.is_empty());
    }

    #[test]
    fn scoped_scrubber_only_applies_listed_categories() {
        let scoped = create_scoped_scrubber(&[Category::Secrets], Platform::Any);
        let result = scoped.scrub("email jane@example.com, key sk-ant-REDACTED");
        assert!(result.text.contains("jane@example.com"));
        assert!(!result.text.contains("sk-ant-"));
    }
}
