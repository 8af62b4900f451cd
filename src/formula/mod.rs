//! Format Inference (C4, spec §4.4/§4.4a) and Formula Applier (C5, spec §4.5).

use crate::models::{
    AddressMethod, Confidence, ExtractionFormula, FormatType, RawRow, SemanticField,
    StandardizedRow,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D*(\d{10,11})\D*").unwrap());
static MISSING_SENTINELS: &[&str] = &["nan", "none", "null", ""];

/// Curated municipalities and pattern-based admissions the assessor scraper
/// is allowed to query against (spec §4.6). Kept as data, not logic.
static ELIGIBLE_CITIES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "HOLLYWOOD", "FORT LAUDERDALE", "PEMBROKE PINES", "CORAL SPRINGS", "MIRAMAR",
        "SUNRISE", "PLANTATION", "DAVIE", "WESTON", "MARGATE", "TAMARAC", "COCONUT CREEK",
        "POMPANO BEACH", "LAUDERHILL", "LAUDERDALE LAKES", "WILTON MANORS", "OAKLAND PARK",
        "HALLANDALE BEACH", "COOPER CITY", "DEERFIELD BEACH", "LIGHTHOUSE POINT",
        "NORTH LAUDERDALE", "PARKLAND", "SEA RANCH LAKES", "SOUTHWEST RANCHES", "WEST PARK",
        "HILLSBORO BEACH", "LAZY LAKE", "PEMBROKE PARK", "HIGHLAND BEACH", "HOLLYWOOD BEACH",
        "FORT LAUDERDALE BEACH", "LAUDERDALE BY THE SEA", "BOULEVARD GARDENS",
        "BROADVIEW PARK", "FRANKLIN PARK", "ROOSEVELT GARDENS", "WASHINGTON PARK",
        "TWIN LAKES", "CARVER RANCHES",
    ]
});

fn is_eligible_city(city: &str) -> bool {
    let c = city.trim().to_uppercase();
    if c.is_empty() {
        return false;
    }
    ELIGIBLE_CITIES.contains(&c.as_str())
        || c.ends_with("BEACH")
        || c.starts_with("FORT ")
        || c.contains("LAUDERDALE")
}

fn coalesce(value: Option<&str>) -> String {
    let v = value.unwrap_or("").trim();
    if MISSING_SENTINELS.contains(&v.to_lowercase().as_str()) {
        String::new()
    } else {
        v.to_string()
    }
}

/// OpenAI-compatible chat completion request shape, used for the single
/// remote schema-inference call (spec §4.4a).
#[derive(Debug, Serialize)]
struct InferenceRequest {
    model: String,
    messages: Vec<InferenceMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct InferenceMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    choices: Vec<InferenceChoice>,
}

#[derive(Debug, Deserialize)]
struct InferenceChoice {
    message: InferenceResponseMessage,
}

#[derive(Debug, Deserialize)]
struct InferenceResponseMessage {
    content: String,
}

/// Raw JSON shape the model is instructed to emit, mirroring
/// [`ExtractionFormula`] but with string keys for the column map.
#[derive(Debug, Deserialize)]
struct InferredFormula {
    format_type: FormatType,
    column_map: HashMap<String, String>,
    existing_phone_columns: Vec<String>,
    address_method: AddressMethod,
}

const SEMANTIC_FIELDS: &[(&str, SemanticField)] = &[
    ("primary_name", SemanticField::PrimaryName),
    ("house_number", SemanticField::HouseNumber),
    ("prefix_direction", SemanticField::PrefixDirection),
    ("street_name", SemanticField::StreetName),
    ("street_type", SemanticField::StreetType),
    ("post_direction", SemanticField::PostDirection),
    ("unit", SemanticField::Unit),
    ("combined_address", SemanticField::CombinedAddress),
    ("city", SemanticField::City),
    ("state", SemanticField::State),
    ("zip", SemanticField::Zip),
];

fn field_name(field: SemanticField) -> &'static str {
    SEMANTIC_FIELDS
        .iter()
        .find(|(_, f)| *f == field)
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

/// Make the single remote inference call. Network errors, timeouts, or
/// malformed JSON all fall through to the deterministic heuristic; this call
/// must never block the pipeline (spec §4.4).
async fn infer_remote(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    columns: &[String],
    sample_rows: &[RawRow],
) -> anyhow::Result<InferredFormula> {
    let sample: Vec<HashMap<&str, &str>> = sample_rows
        .iter()
        .take(3)
        .map(|row| row.cells.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect())
        .collect();

    let instructions = format!(
        "Columns: {:?}. Sample rows: {}. Map these columns to the fields \
         primary_name, house_number, prefix_direction, street_name, street_type, \
         post_direction, unit, combined_address, city, state, zip, and list any \
         columns holding pre-existing phone numbers. Respond with a JSON object \
         matching {{format_type, column_map, existing_phone_columns, address_method}}.",
        columns,
        serde_json::to_string(&sample)?,
    );

    let request = InferenceRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![InferenceMessage {
            role: "user".to_string(),
            content: instructions,
        }],
        temperature: 0.0,
    };

    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&request)
        .timeout(Duration::from_secs(30))
        .send()
        .await?
        .error_for_status()?
        .json::<InferenceResponse>()
        .await?;

    let content = response
        .choices
        .first()
        .ok_or_else(|| anyhow::anyhow!("inference response had no choices"))?
        .message
        .content
        .clone();

    Ok(serde_json::from_str(&content)?)
}

/// Column-name substring heuristic used when the remote call fails or is
/// unavailable (spec §4.4).
fn infer_heuristic(columns: &[String]) -> ExtractionFormula {
    let mut column_map = HashMap::new();
    let mut existing_phone_columns = Vec::new();

    for col in columns {
        let lower = col.to_lowercase();
        if lower.contains("house") {
            column_map.insert(SemanticField::HouseNumber, col.clone());
        } else if lower.contains("street") && lower.contains("type") {
            column_map.insert(SemanticField::StreetType, col.clone());
        } else if lower.contains("street") {
            column_map.insert(SemanticField::StreetName, col.clone());
        } else if lower.contains("city") {
            column_map.insert(SemanticField::City, col.clone());
        } else if lower.contains("state") {
            column_map.insert(SemanticField::State, col.clone());
        } else if lower.contains("zip") {
            column_map.insert(SemanticField::Zip, col.clone());
        } else if lower.contains("name") || lower.contains("owner") {
            column_map.entry(SemanticField::PrimaryName).or_insert_with(|| col.clone());
        } else if lower.contains("address") {
            column_map.entry(SemanticField::CombinedAddress).or_insert_with(|| col.clone());
        }
        if lower.contains("phone") || lower.contains("tel") {
            existing_phone_columns.push(col.clone());
        }
    }

    let address_method = if column_map.contains_key(&SemanticField::HouseNumber) {
        AddressMethod::SeparatedComponents
    } else {
        AddressMethod::ParseCombined
    };

    let format_type = match address_method {
        AddressMethod::SeparatedComponents => FormatType::SeparatedComponents,
        AddressMethod::ParseCombined => FormatType::CombinedAddress,
    };

    ExtractionFormula {
        format_type,
        column_map,
        existing_phone_columns,
        address_method,
        confidence: Confidence::Low,
        validation_notes: "heuristic fallback (column-name substring match)".to_string(),
        records_with_phones: 0,
        records_processable: 0,
    }
}

/// Scan the full file with the phone regex and fill in the empirically
/// observed counts (spec §4.4's post-validation step).
fn post_validate(mut formula: ExtractionFormula, rows: &[RawRow]) -> ExtractionFormula {
    let mut with_phones = 0usize;
    let mut processable = 0usize;

    for row in rows {
        let has_phone = row.values().any(|v| PHONE_RE.is_match(v));
        if has_phone {
            with_phones += 1;
        }
        let has_name_or_address = formula.column_for(SemanticField::PrimaryName).is_some()
            || formula.column_for(SemanticField::CombinedAddress).is_some()
            || formula.column_for(SemanticField::StreetName).is_some();
        if has_name_or_address {
            processable += 1;
        }
    }

    formula.records_with_phones = with_phones;
    formula.records_processable = processable;
    formula
}

/// Run format inference for a file: one remote call, falling back to the
/// heuristic on any failure, always followed by post-validation.
pub async fn infer(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    columns: &[String],
    rows: &[RawRow],
) -> ExtractionFormula {
    let remote = infer_remote(client, endpoint, api_key, columns, rows).await;

    let formula = match remote {
        Ok(inferred) => {
            let mut column_map = HashMap::new();
            for (name, field) in SEMANTIC_FIELDS {
                if let Some(col) = inferred.column_map.get(*name) {
                    column_map.insert(*field, col.clone());
                }
            }
            ExtractionFormula {
                format_type: inferred.format_type,
                column_map,
                existing_phone_columns: inferred.existing_phone_columns,
                address_method: inferred.address_method,
                confidence: Confidence::High,
                validation_notes: "remote inference".to_string(),
                records_with_phones: 0,
                records_processable: 0,
            }
        }
        Err(err) => {
            warn!(error = %err, "schema inference call failed, using heuristic fallback");
            infer_heuristic(columns)
        }
    };

    post_validate(formula, rows)
}

fn build_street_address_separated(row: &RawRow, formula: &ExtractionFormula) -> String {
    let mut parts = Vec::new();
    for field in [
        SemanticField::HouseNumber,
        SemanticField::PrefixDirection,
        SemanticField::StreetName,
        SemanticField::StreetType,
        SemanticField::PostDirection,
    ] {
        if let Some(col) = formula.column_for(field) {
            let value = coalesce(row.get(col));
            if !value.is_empty() {
                parts.push(value);
            }
        }
    }
    if let Some(col) = formula.column_for(SemanticField::Unit) {
        let unit = coalesce(row.get(col));
        if !unit.is_empty() {
            parts.push(format!("#{unit}"));
        }
    }
    parts.join(" ")
}

fn build_street_address_combined(row: &RawRow, formula: &ExtractionFormula) -> String {
    let combined = formula
        .column_for(SemanticField::CombinedAddress)
        .map(|col| coalesce(row.get(col)))
        .unwrap_or_default();

    let without_trailing = combined
        .split(',')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    without_trailing
}

fn build_city(row: &RawRow, formula: &ExtractionFormula, combined: &str) -> String {
    if let Some(col) = formula.column_for(SemanticField::City) {
        let value = coalesce(row.get(col));
        if !value.is_empty() {
            return value.to_uppercase();
        }
    }
    // parse_combined: second comma-delimited segment, if any.
    combined
        .split(',')
        .nth(1)
        .map(|s| s.trim().to_uppercase())
        .unwrap_or_default()
}

/// Apply an ExtractionFormula to a single RawRow (spec §4.5 steps 1-6).
fn apply_row(index: usize, row: &RawRow, formula: &ExtractionFormula) -> StandardizedRow {
    let raw_name = formula
        .column_for(SemanticField::PrimaryName)
        .map(|col| coalesce(row.get(col)))
        .unwrap_or_default();
    let cleaned_name = crate::name::clean(&raw_name);

    let (street_address, city) = match formula.address_method {
        AddressMethod::SeparatedComponents => {
            let addr = build_street_address_separated(row, formula);
            let city = build_city(row, formula, "");
            (addr, city)
        }
        AddressMethod::ParseCombined => {
            let raw_combined = formula
                .column_for(SemanticField::CombinedAddress)
                .map(|col| coalesce(row.get(col)))
                .unwrap_or_default();
            let addr = build_street_address_combined(row, formula);
            let city = build_city(row, formula, &raw_combined);
            (addr, city)
        }
    };

    let state = formula
        .column_for(SemanticField::State)
        .map(|col| coalesce(row.get(col)))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "FL".to_string());

    let search_format = if !street_address.is_empty() && !city.is_empty() {
        format!("{street_address}, {}", city.to_uppercase())
    } else {
        String::new()
    };

    let phone_matches: Vec<String> = row
        .values()
        .filter_map(|v| PHONE_RE.captures(v).map(|c| c[1].to_string()))
        .collect();
    let has_existing_phone = !phone_matches.is_empty();
    let existing_primary = phone_matches.first().cloned().unwrap_or_default();
    let existing_secondary = phone_matches.get(1).cloned().unwrap_or_default();

    let eligible = is_eligible_city(&city);

    StandardizedRow {
        original_index: index,
        cleaned_name,
        street_address,
        city,
        state,
        search_format,
        has_existing_phone,
        existing_primary,
        existing_secondary,
        eligible,
    }
}

/// Apply an ExtractionFormula across all rows in input order, dropping rows
/// with neither a usable name nor a usable address (spec §4.5 step 7).
pub fn apply(rows: &[(usize, RawRow)], formula: &ExtractionFormula) -> Vec<StandardizedRow> {
    rows.iter()
        .map(|(index, row)| apply_row(*index, row, formula))
        .filter(StandardizedRow::is_usable)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula_separated() -> ExtractionFormula {
        let mut column_map = HashMap::new();
        column_map.insert(SemanticField::PrimaryName, "Owner Name 1".to_string());
        column_map.insert(SemanticField::HouseNumber, "House Number".to_string());
        column_map.insert(SemanticField::StreetName, "Street Name".to_string());
        column_map.insert(SemanticField::StreetType, "Street Type".to_string());
        column_map.insert(SemanticField::City, "City Name".to_string());
        column_map.insert(SemanticField::State, "State Abbreviation".to_string());
        ExtractionFormula {
            format_type: FormatType::SeparatedComponents,
            column_map,
            existing_phone_columns: vec![],
            address_method: AddressMethod::SeparatedComponents,
            confidence: Confidence::High,
            validation_notes: String::new(),
            records_with_phones: 0,
            records_processable: 0,
        }
    }

    fn row(cells: &[(&str, &str)]) -> RawRow {
        RawRow {
            cells: cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn applies_separated_components_and_builds_search_format() {
        let formula = formula_separated();
        let r = row(&[
            ("Owner Name 1", "SMITH JOHN"),
            ("House Number", "5920"),
            ("Street Name", "33RD"),
            ("Street Type", "AVE"),
            ("City Name", "HOLLYWOOD"),
            ("State Abbreviation", "FL"),
        ]);
        let standardized = apply_row(0, &r, &formula);
        assert_eq!(standardized.cleaned_name, "JOHN SMITH");
        assert_eq!(standardized.street_address, "5920 33RD AVE");
        assert_eq!(standardized.search_format, "5920 33RD AVE, HOLLYWOOD");
        assert!(standardized.eligible);
    }

    #[test]
    fn drops_unusable_rows() {
        let formula = formula_separated();
        let rows = vec![(0, row(&[("Owner Name 1", ""), ("House Number", "")]))];
        let standardized = apply(&rows, &formula);
        assert!(standardized.is_empty());
    }

    #[test]
    fn formula_application_is_idempotent() {
        let formula = formula_separated();
        let rows = vec![(
            0,
            row(&[
                ("Owner Name 1", "SMITH JOHN"),
                ("House Number", "5920"),
                ("Street Name", "33RD"),
                ("Street Type", "AVE"),
                ("City Name", "HOLLYWOOD"),
                ("State Abbreviation", "FL"),
            ]),
        )];
        let first = apply(&rows, &formula);
        let second = apply(&rows, &formula);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].search_format, second[0].search_format);
    }

    #[test]
    fn eligibility_follows_curated_whitelist_and_patterns() {
        assert!(is_eligible_city("HOLLYWOOD"));
        assert!(is_eligible_city("DELRAY BEACH"));
        assert!(is_eligible_city("FORT LAUDERDALE"));
        assert!(!is_eligible_city("ORLANDO"));
    }

    #[test]
    fn field_name_round_trips() {
        assert_eq!(field_name(SemanticField::City), "city");
    }
}
