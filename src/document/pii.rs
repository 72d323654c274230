use crate::models::document::PiiCategory;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap()
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap()
});

static NATIONAL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap()
});

static CREDIT_CARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap()
});

#[derive(Debug, Clone)]
pub struct PiiSpan {
    pub category: PiiCategory,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PiiDetection {
    pub categories: Vec<PiiCategory>,
    pub spans: Vec<PiiSpan>,
}

/// Detects at minimum: email addresses, phone numbers, national-ID-like
/// patterns, credit-card-like patterns. Deterministic on identical input.
pub struct PiiRedactor;

impl PiiRedactor {
    pub fn detect(text: &str) -> PiiDetection {
        let mut spans = Vec::new();

        for m in EMAIL_RE.find_iter(text) {
            spans.push(PiiSpan {
                category: PiiCategory::Email,
                start: m.start(),
                end: m.end(),
            });
        }
        for m in CREDIT_CARD_RE.find_iter(text) {
            let digits: usize = m.as_str().chars().filter(|c| c.is_ascii_digit()).count();
            if (13..=16).contains(&digits) {
                spans.push(PiiSpan {
                    category: PiiCategory::CreditCard,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
        for m in NATIONAL_ID_RE.find_iter(text) {
            spans.push(PiiSpan {
                category: PiiCategory::NationalId,
                start: m.start(),
                end: m.end(),
            });
        }
        for m in PHONE_RE.find_iter(text) {
            // Avoid double-counting a span already claimed by a stricter pattern.
            let overlaps = spans.iter().any(|s| s.start < m.end() && m.start() < s.end);
            if !overlaps {
                spans.push(PiiSpan {
                    category: PiiCategory::Phone,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        spans.sort_by_key(|s| s.start);

        let mut categories: Vec<PiiCategory> = spans.iter().map(|s| s.category).collect();
        categories.sort_by_key(|c| c.as_str());
        categories.dedup();

        PiiDetection { categories, spans }
    }

    pub fn redact(text: &str) -> String {
        let detection = Self::detect(text);
        if detection.spans.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for span in &detection.spans {
            if span.start < cursor {
                continue; // overlapping span already covered
            }
            out.push_str(&text[cursor..span.start]);
            out.push_str(&format!("[REDACTED:{}]", span.category.as_str()));
            cursor = span.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_email() {
        let d = PiiRedactor::detect("contact support@example.com for help");
        assert!(d.categories.contains(&PiiCategory::Email));
    }

    #[test]
    fn redact_replaces_email() {
        let redacted = PiiRedactor::redact("contact support@example.com for help");
        assert!(!redacted.contains("support@example.com"));
        assert!(redacted.contains("[REDACTED:email]"));
    }

    #[test]
    fn clean_text_has_no_categories() {
        let d = PiiRedactor::detect("our support hours are 9am to 5pm");
        assert!(d.categories.is_empty());
    }

    #[test]
    fn deterministic_on_identical_input() {
        let a = PiiRedactor::detect("a@b.com");
        let b = PiiRedactor::detect("a@b.com");
        assert_eq!(a.categories, b.categories);
    }
}
