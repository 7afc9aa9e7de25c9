// src/classify/keywords.rs
//! Keyword rules for category and priority, using the vocabulary of the
//! `categorize-complaint` edge function. Results can still differ from the
//! remote path: priority terms match whole words here, while the edge
//! function matches substrings (it reads "overflow" as low priority).

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ComplaintCategory, Prediction, Priority};

const CATEGORY_KEYWORDS: &[(ComplaintCategory, &[&str])] = &[
    (
        ComplaintCategory::Water,
        &["water", "leak", "pipe", "supply", "drinking", "flood", "drainage"],
    ),
    (
        ComplaintCategory::Electricity,
        &["electricity", "power", "outage", "blackout", "electric", "transformer"],
    ),
    (
        ComplaintCategory::Roads,
        &["road", "pothole", "street", "traffic", "signal", "highway", "pavement"],
    ),
    (
        ComplaintCategory::Sanitation,
        &["garbage", "waste", "trash", "sanitation", "clean", "sewer", "hygiene"],
    ),
    (
        ComplaintCategory::Public,
        &["park", "safety", "noise", "public", "community", "pollution", "neighbor"],
    ),
];

const URGENT_TERMS: &[&str] = &["urgent", "emergency", "danger", "immediate", "serious", "severe"];
const LOW_TERMS: &[&str] = &["minor", "small", "low", "slight"];

// Whole words only: "overflow" must not read as "low".
static RE_URGENT: Lazy<Regex> = Lazy::new(|| word_regex(URGENT_TERMS));
static RE_LOW: Lazy<Regex> = Lazy::new(|| word_regex(LOW_TERMS));

fn word_regex(terms: &[&str]) -> Regex {
    let alt = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"\b(?:{alt})\b")).expect("static keyword regex")
}

/// Score `title + description` against the keyword tables.
pub fn predict(title: &str, description: &str) -> Prediction {
    let text = format!("{title} {description}").to_lowercase();

    let mut best = ComplaintCategory::Other;
    let mut max_score = 0usize;
    let mut total = 0usize;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let score: usize = keywords.iter().map(|k| text.matches(k).count()).sum();
        total += score;
        if score > max_score {
            max_score = score;
            best = *category;
        }
    }

    let confidence = if max_score == 0 {
        1.0
    } else {
        max_score as f32 / total as f32
    };

    Prediction {
        category: best,
        confidence,
        priority: priority_of(&text),
    }
}

/// Urgent wording wins over minor wording; neither means medium.
pub fn priority_of(lowercased: &str) -> Priority {
    if RE_URGENT.is_match(lowercased) {
        Priority::High
    } else if RE_LOW.is_match(lowercased) {
        Priority::Low
    } else {
        Priority::Medium
    }
}
