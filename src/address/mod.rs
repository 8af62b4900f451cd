//! Address Normalizer & Matcher (spec §4.3 / C3).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Ordinal word <-> numeral equivalence, first through the twenties plus the
/// named tens.
static ORDINALS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("FIRST", "1ST"), ("SECOND", "2ND"), ("THIRD", "3RD"), ("FOURTH", "4TH"),
        ("FIFTH", "5TH"), ("SIXTH", "6TH"), ("SEVENTH", "7TH"), ("EIGHTH", "8TH"),
        ("NINTH", "9TH"), ("TENTH", "10TH"), ("ELEVENTH", "11TH"), ("TWELFTH", "12TH"),
        ("THIRTEENTH", "13TH"), ("FOURTEENTH", "14TH"), ("FIFTEENTH", "15TH"),
        ("SIXTEENTH", "16TH"), ("SEVENTEENTH", "17TH"), ("EIGHTEENTH", "18TH"),
        ("NINETEENTH", "19TH"), ("TWENTIETH", "20TH"), ("TWENTY-FIRST", "21ST"),
        ("TWENTY-SECOND", "22ND"), ("TWENTY-THIRD", "23RD"), ("TWENTY-FOURTH", "24TH"),
        ("TWENTY-FIFTH", "25TH"), ("TWENTY-SIXTH", "26TH"), ("TWENTY-SEVENTH", "27TH"),
        ("TWENTY-EIGHTH", "28TH"), ("TWENTY-NINTH", "29TH"), ("THIRTIETH", "30TH"),
        ("FORTIETH", "40TH"), ("FIFTIETH", "50TH"),
    ]
});

static DIRECTIONS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("NORTH", "N"), ("SOUTH", "S"), ("EAST", "E"), ("WEST", "W"),
        ("NORTHEAST", "NE"), ("NORTHWEST", "NW"), ("SOUTHEAST", "SE"), ("SOUTHWEST", "SW"),
    ]
});

static STREET_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("STREET", "ST"), ("AVENUE", "AVE"), ("DRIVE", "DR"), ("COURT", "CT"),
        ("PLACE", "PL"), ("ROAD", "RD"), ("CIRCLE", "CIR"), ("BOULEVARD", "BLVD"),
        ("LANE", "LN"), ("TERRACE", "TER"), ("PARKWAY", "PKWY"), ("HIGHWAY", "HWY"),
    ]
    .into_iter()
    .collect()
});

const GENERIC_STREET_TYPES: &[&str] =
    &["ST", "AVE", "DR", "CT", "PL", "RD", "LN", "CIR", "BLVD", "TER", "WAY"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DASH_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-.]").unwrap());

/// Hyphenated ordinals (`TWENTY-FIRST`..`TWENTY-NINTH`) have to be matched
/// as a single two-word unit before `DASH_DOT` strips the hyphen, otherwise
/// they fall apart into `TWENTY` + `FIRST` and the second half re-expands
/// to `1ST` instead of staying part of `21ST`.
static HYPHENATED_ORDINALS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ORDINALS
        .iter()
        .filter(|(word, _)| word.contains('-'))
        .map(|(word, short)| {
            let pattern = format!(r"\b{}\b", regex::escape(word));
            (Regex::new(&pattern).unwrap(), *short)
        })
        .collect()
});

fn replace_hyphenated_ordinals(s: &str) -> String {
    let mut out = s.to_string();
    for (re, short) in HYPHENATED_ORDINALS.iter() {
        out = re.replace_all(&out, *short).to_string();
    }
    out
}

/// Normalize an address string: uppercase, collapse whitespace, expand
/// hyphenated ordinals as a unit, strip remaining `-` and `.`, expand
/// ordinal words and directionals to their short forms, and standardize
/// street types (spec §4.3).
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim().to_uppercase();
    s = replace_hyphenated_ordinals(&s);
    s = DASH_DOT.replace_all(&s, " ").to_string();
    s = WHITESPACE.replace_all(s.trim(), " ").to_string();

    let tokens: Vec<String> = s
        .split_whitespace()
        .map(|tok| {
            if let Some((_, short)) = ORDINALS.iter().find(|(word, _)| *word == tok) {
                return short.to_string();
            }
            if let Some((_, short)) = DIRECTIONS.iter().find(|(word, _)| *word == tok) {
                return short.to_string();
            }
            if let Some(short) = STREET_TYPES.get(tok.as_str()) {
                return short.to_string();
            }
            tok.to_string()
        })
        .collect();

    tokens.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub confidence: u8,
    pub reason: String,
}

fn ordinal_suffix(n: u32) -> &'static str {
    let last_two = n % 100;
    if (11..=13).contains(&last_two) {
        return "TH";
    }
    match n % 10 {
        1 => "ST",
        2 => "ND",
        3 => "RD",
        _ => "TH",
    }
}

/// Expand a normalized token into every surface form it could legally
/// appear as on the other side: itself, numeral<->ordinal-word equivalence,
/// and directional long/short equivalence.
fn variations(token: &str) -> Vec<String> {
    let mut out = vec![token.to_string()];

    if let Some((word, short)) = ORDINALS.iter().find(|(_, short)| *short == token) {
        out.push(word.to_string());
        let numeral: String = short.chars().take_while(|c| c.is_ascii_digit()).collect();
        out.push(numeral);
    } else if let Ok(n) = token.parse::<u32>() {
        out.push(format!("{n}{}", ordinal_suffix(n)));
        if let Some((word, _)) = ORDINALS.iter().find(|(_, short)| {
            short.trim_end_matches(|c: char| c.is_alphabetic()) == n.to_string()
        }) {
            out.push(word.to_string());
        }
    }

    if let Some((word, short)) = DIRECTIONS.iter().find(|(_, short)| *short == token) {
        out.push(word.to_string());
        let _ = short;
    } else if let Some((word, short)) = DIRECTIONS.iter().find(|(word, _)| *word == token) {
        out.push(short.to_string());
        let _ = word;
    }

    out
}

/// Match two raw addresses per spec §4.3. Both sides are normalized
/// internally; callers should pass raw (or already-normalized) strings.
pub fn matches(a: &str, b: &str) -> MatchResult {
    let na = normalize(a);
    let nb = normalize(b);
    let tokens_a: Vec<&str> = na.split_whitespace().collect();
    let tokens_b: Vec<&str> = nb.split_whitespace().collect();

    if tokens_a.len() < 2 || tokens_b.len() < 2 {
        return MatchResult {
            matched: false,
            confidence: 0,
            reason: "fewer than two tokens on one side".to_string(),
        };
    }

    if tokens_a[0] != tokens_b[0] {
        return MatchResult {
            matched: false,
            confidence: 0,
            reason: "house number mismatch".to_string(),
        };
    }

    let rest_a = &tokens_a[1..];
    let rest_b = &tokens_b[1..];

    let var_b: Vec<Vec<String>> = rest_b.iter().map(|t| variations(t)).collect();
    let mut consumed = vec![false; rest_b.len()];
    let mut matched_tokens: Vec<&str> = Vec::new();

    for token in rest_a {
        let own_variations = variations(token);
        if let Some(idx) = var_b.iter().enumerate().position(|(i, vars)| {
            !consumed[i] && vars.iter().any(|v| own_variations.contains(v))
        }) {
            consumed[idx] = true;
            matched_tokens.push(token);
        }
    }

    let max_tokens = rest_a.len().max(rest_b.len()).max(1);
    let required = if tokens_a.len().max(tokens_b.len()) <= 3 { 1 } else { 2 };

    if matched_tokens.len() < required {
        return MatchResult {
            matched: false,
            confidence: 0,
            reason: "insufficient matching tokens".to_string(),
        };
    }

    if matched_tokens.len() == 1 && GENERIC_STREET_TYPES.contains(&matched_tokens[0]) {
        return MatchResult {
            matched: false,
            confidence: 30,
            reason: "only a generic street type matched".to_string(),
        };
    }

    let base = ((matched_tokens.len() as f64 / max_tokens as f64) * 100.0).round() as i32;
    let bonus = 20 + if matched_tokens.len() >= 2 { 10 } else { 0 };
    let confidence = (base + bonus).clamp(0, 100).max(70) as u8;

    MatchResult {
        matched: true,
        confidence,
        reason: format!("{} matching token(s)", matched_tokens.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["5920 SW 33rd Ave", "123 North Main Street", "  456   Oak   Drive  "] {
            let once = normalize(raw);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn accepts_directional_and_ordinal_equivalence() {
        let result = matches("5920 SW 33RD AVE", "5920 SOUTHWEST 33 AVENUE");
        assert!(result.matched);
        assert!(result.confidence >= 70);
    }

    #[test]
    fn matches_hyphenated_ordinal_against_numeral_form() {
        let result = matches("5920 Twenty-First Ave", "5920 21st Ave");
        assert!(result.matched);
        assert!(result.confidence >= 70);
    }

    #[test]
    fn rejects_on_house_number_mismatch() {
        let result = matches("123 MAIN ST", "124 MAIN ST");
        assert!(!result.matched);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn rejects_generic_street_type_only_match() {
        let result = matches("500 ST", "500 AVE");
        assert!(!result.matched);
        assert_eq!(result.confidence, 30);
    }

    #[test]
    fn requires_at_least_two_tokens_per_side() {
        let result = matches("500", "500 MAIN ST");
        assert!(!result.matched);
    }
}
