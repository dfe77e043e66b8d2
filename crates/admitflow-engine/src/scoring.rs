//! Rule-based lead scoring and source categorisation.
//!
//! Both functions are pure: they read only the lead and the rules passed in.

use admitflow_store::{Lead, SourceCategory};

use crate::types::ScoringRules;

const BASE_SCORE: i32 = 50;
const PROFESSIONAL_EMAIL_BONUS: i32 = 15;
const PHONE_BONUS: i32 = 10;
const PROGRAM_INTEREST_BONUS: i32 = 10;
const PROGRAM_INTEREST_MIN_LEN: usize = 10;
const TARGET_COUNTRY_BONUS: i32 = 10;
const BUDGET_BONUS: i32 = 15;
const QUALITY_SOURCE_BONUS: i32 = 10;

/// Keyword table for [`categorize_source`], checked in order.
const SOURCE_KEYWORDS: &[(SourceCategory, &[&str])] = &[
    (SourceCategory::Website, &["website", "landing", "form"]),
    (
        SourceCategory::Referral,
        &["referral", "refer", "friend", "partner", "alumni"],
    ),
    (
        SourceCategory::SocialMedia,
        &[
            "facebook",
            "instagram",
            "linkedin",
            "twitter",
            "tiktok",
            "youtube",
            "social",
        ],
    ),
    (SourceCategory::Email, &["email", "e-mail", "newsletter", "mail"]),
    (
        SourceCategory::Event,
        &["event", "fair", "expo", "seminar", "webinar", "workshop"],
    ),
    (
        SourceCategory::SearchEngine,
        &["google", "bing", "search", "seo"],
    ),
];

/// The lowercased domain part of an email address.
#[must_use]
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    (!domain.is_empty()).then(|| domain.to_ascii_lowercase())
}

/// The lowercased local part of an email address.
#[must_use]
pub fn email_local_part(email: &str) -> Option<String> {
    let (local, _) = email.trim().rsplit_once('@')?;
    (!local.is_empty()).then(|| local.to_ascii_lowercase())
}

/// Returns true if the email's domain is not a known free-mail provider.
#[must_use]
pub fn is_professional_email(email: &str, rules: &ScoringRules) -> bool {
    email_domain(email).is_some_and(|domain| {
        !rules
            .generic_email_domains
            .iter()
            .any(|generic| generic.eq_ignore_ascii_case(&domain))
    })
}

fn has_text(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Score a lead in `0..=100`.
#[must_use]
pub fn score(lead: &Lead, rules: &ScoringRules) -> u8 {
    let mut total = BASE_SCORE;

    if is_professional_email(&lead.email, rules) {
        total += PROFESSIONAL_EMAIL_BONUS;
    }
    if has_text(lead.phone.as_ref()) {
        total += PHONE_BONUS;
    }
    if lead
        .program_interest
        .as_ref()
        .is_some_and(|p| p.trim().chars().count() > PROGRAM_INTEREST_MIN_LEN)
    {
        total += PROGRAM_INTEREST_BONUS;
    }
    if has_text(lead.target_country.as_ref()) {
        total += TARGET_COUNTRY_BONUS;
    }
    if lead.budget.is_some_and(|b| b > 0.0) {
        total += BUDGET_BONUS;
    }

    let source = lead.source.to_lowercase();
    if rules
        .quality_source_keywords
        .iter()
        .any(|keyword| source.contains(&keyword.to_lowercase()))
    {
        total += QUALITY_SOURCE_BONUS;
    }

    u8::try_from(total.clamp(0, 100)).unwrap_or(100)
}

/// Map a free-text source to its category; first match wins.
#[must_use]
pub fn categorize_source(raw: &str) -> SourceCategory {
    let source = raw.to_lowercase();
    SOURCE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| source.contains(k)))
        .map_or(SourceCategory::Other, |(category, _)| *category)
}
