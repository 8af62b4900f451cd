//! Phone Validator (spec §4.9 / C9): mobile-only filter with row explosion.

use crate::models::PhoneLabel;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// North American area codes known to be mobile-first, used as the
/// fallback heuristic when the remote classifier is unavailable.
const MOBILE_FIRST_AREA_CODES: &[&str] = &["321", "407", "689", "754", "786"];

const MAX_BATCH_SIZE: usize = 800;

static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").unwrap());

/// Format a digit string (10 or 11 digits, optional leading country digit)
/// into `(NNN) NNN-NNNN`. Returns the input unchanged if it isn't a
/// recognizable US/Canada number.
pub fn format_phone(raw: &str) -> String {
    let digits = DIGITS_ONLY.replace_all(raw, "").to_string();
    let ten = if digits.len() == 11 && digits.starts_with('1') {
        &digits[1..]
    } else if digits.len() == 10 {
        &digits[..]
    } else {
        return raw.to_string();
    };
    format!("({}) {}-{}", &ten[0..3], &ten[3..6], &ten[6..10])
}

fn area_code(formatted_or_raw: &str) -> Option<String> {
    let digits = DIGITS_ONLY.replace_all(formatted_or_raw, "").to_string();
    let ten = if digits.len() == 11 { &digits[1..] } else { &digits[..] };
    if ten.len() != 10 {
        return None;
    }
    Some(ten[0..3].to_string())
}

fn heuristic_label(number: &str) -> PhoneLabel {
    match area_code(number) {
        Some(code) if MOBILE_FIRST_AREA_CODES.contains(&code.as_str()) => PhoneLabel::Mobile,
        Some(_) => PhoneLabel::Landline,
        None => PhoneLabel::Invalid,
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    numbers: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    labels: Vec<String>,
}

fn parse_label(s: &str) -> PhoneLabel {
    match s.to_lowercase().as_str() {
        "mobile" => PhoneLabel::Mobile,
        "landline" => PhoneLabel::Landline,
        _ => PhoneLabel::Invalid,
    }
}

async fn classify_sub_batch(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    numbers: &[String],
) -> anyhow::Result<Vec<PhoneLabel>> {
    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&ClassifyRequest { numbers })
        .timeout(Duration::from_secs(120))
        .send()
        .await?
        .error_for_status()?
        .json::<ClassifyResponse>()
        .await?;

    if response.labels.len() != numbers.len() {
        anyhow::bail!("classifier returned {} labels for {} numbers", response.labels.len(), numbers.len());
    }

    Ok(response.labels.iter().map(|s| parse_label(s)).collect())
}

/// Validate a batch of phone numbers against the remote classifier,
/// splitting into sub-batches of at most 800 and falling back to the
/// area-code heuristic on any failure (spec §4.9).
pub async fn validate_batch(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    numbers: &[String],
) -> Vec<PhoneLabel> {
    if numbers.is_empty() {
        return Vec::new();
    }

    let mut labels = Vec::with_capacity(numbers.len());
    for chunk in numbers.chunks(MAX_BATCH_SIZE) {
        match classify_sub_batch(client, endpoint, api_key, chunk).await {
            Ok(chunk_labels) => labels.extend(chunk_labels),
            Err(err) => {
                warn!(error = %err, "phone classifier call failed, using area-code heuristic");
                labels.extend(chunk.iter().map(|n| heuristic_label(n)));
            }
        }
    }
    labels
}

/// A row that has gone through mobile-only filtering, carrying exactly one
/// surviving phone number (spec §4.9 row explosion table).
#[derive(Debug, Clone)]
pub struct ExplodedRow {
    pub original_index: usize,
    pub phone_number: String,
}

/// Apply the row-explosion table to a pair of candidate phone numbers (the
/// primary/secondary numbers a scrape turned up for one row) plus the
/// labels classified for them. Row order is preserved by the caller
/// iterating rows in order.
pub fn explode_row(
    original_index: usize,
    primary_phone: &str,
    secondary_phone: &str,
    primary_label: Option<PhoneLabel>,
    secondary_label: Option<PhoneLabel>,
) -> Vec<ExplodedRow> {
    let primary_mobile = primary_label == Some(PhoneLabel::Mobile) && !primary_phone.is_empty();
    let secondary_mobile = secondary_label == Some(PhoneLabel::Mobile) && !secondary_phone.is_empty();

    let mut out = Vec::new();
    if primary_mobile {
        out.push(ExplodedRow {
            original_index,
            phone_number: format_phone(primary_phone),
        });
    }
    if secondary_mobile {
        out.push(ExplodedRow {
            original_index,
            phone_number: format_phone(secondary_phone),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ten_digit_number() {
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
    }

    #[test]
    fn formats_eleven_digit_number_with_country_code() {
        assert_eq!(format_phone("15551234567"), "(555) 123-4567");
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = format_phone("555-123-4567");
        let twice = format_phone(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn heuristic_flags_mobile_first_area_code() {
        assert_eq!(heuristic_label("(321) 555-1234"), PhoneLabel::Mobile);
        assert_eq!(heuristic_label("(212) 555-1234"), PhoneLabel::Landline);
    }

    #[test]
    fn explosion_both_mobile_yields_two_rows() {
        let exploded = explode_row(3, "5551234567", "5559876543", Some(PhoneLabel::Mobile), Some(PhoneLabel::Mobile));
        assert_eq!(exploded.len(), 2);
        assert!(exploded.iter().all(|r| r.original_index == 3));
    }

    #[test]
    fn explosion_both_other_drops_row() {
        let exploded = explode_row(0, "", "", Some(PhoneLabel::Landline), Some(PhoneLabel::Invalid));
        assert!(exploded.is_empty());
    }

    #[test]
    fn explosion_one_mobile_yields_one_row() {
        let exploded = explode_row(1, "5551234567", "", Some(PhoneLabel::Mobile), Some(PhoneLabel::Landline));
        assert_eq!(exploded.len(), 1);
    }
}
