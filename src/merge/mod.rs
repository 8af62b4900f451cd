//! Merge Engine (spec §4.10 / C10): reattaches scraped owner/phone records
//! to the user's original rows, preserving order and pre-existing data.

use crate::models::{OwnerRecord, PhoneRecord, RawRow};
use std::collections::HashMap;

/// A row slated for output: the original cells plus whatever columns the
/// merge attached (owner name, phone number).
#[derive(Debug, Clone)]
pub struct MergedRow {
    pub original_index: usize,
    pub cells: Vec<(String, String)>,
    pub owner_name: Option<String>,
    pub phone_number: Option<String>,
}

impl MergedRow {
    fn from_raw(index: usize, row: &RawRow) -> Self {
        Self {
            original_index: index,
            cells: row.cells.clone(),
            owner_name: None,
            phone_number: None,
        }
    }

    fn has_existing_phone(&self) -> bool {
        self.cells.iter().any(|(k, v)| {
            k.to_lowercase().contains("phone") && !v.trim().is_empty()
        })
    }
}

fn token_set(s: &str) -> std::collections::HashSet<String> {
    s.to_uppercase().split_whitespace().map(|t| t.to_string()).collect()
}

fn name_similarity(a: &str, b: &str) -> f64 {
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let overlap = ta.intersection(&tb).count();
    overlap as f64 / ta.len().max(tb.len()) as f64
}

fn jaccard(a: &str, b: &str) -> f64 {
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Strategy 2 (spec §4.10): name similarity (weighted x2) + address-component
/// equality, accepting the best candidate with score >= 0.6.
fn match_by_name_address(
    target_name: &str,
    target_address: &str,
    candidates: &[MergedRow],
    name_col: &str,
    address_col: &str,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, row) in candidates.iter().enumerate() {
        let candidate_name = row
            .cells
            .iter()
            .find(|(k, _)| k == name_col)
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        let candidate_address = row
            .cells
            .iter()
            .find(|(k, _)| k == address_col)
            .map(|(_, v)| v.as_str())
            .unwrap_or("");

        let name_score = name_similarity(target_name, candidate_name) * 2.0;
        let address_score = if candidate_address.trim().to_uppercase() == target_address.trim().to_uppercase() {
            1.0
        } else {
            0.0
        };
        let score = (name_score + address_score) / 3.0;

        if score >= 0.6 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Strategy 3: names whose first 5-6 characters match on both sides.
fn match_by_fuzzy_prefix(target_name: &str, candidates: &[MergedRow], name_col: &str) -> Option<usize> {
    let target_prefix: String = target_name.to_uppercase().chars().take(6).collect();
    if target_prefix.len() < 5 {
        return None;
    }
    candidates.iter().position(|row| {
        let candidate = row
            .cells
            .iter()
            .find(|(k, _)| k == name_col)
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        let candidate_prefix: String = candidate.to_uppercase().chars().take(6).collect();
        candidate_prefix.len() >= 5 && (candidate_prefix.starts_with(&target_prefix[..5]) || target_prefix.starts_with(&candidate_prefix[..5.min(candidate_prefix.len())]))
    })
}

/// Strategy 4: Jaccard similarity on word sets, threshold >= 0.7, used only
/// when overall phone coverage from earlier strategies is below 30%.
fn match_by_jaccard(target_name: &str, candidates: &[MergedRow], name_col: &str) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, row) in candidates.iter().enumerate() {
        let candidate = row
            .cells
            .iter()
            .find(|(k, _)| k == name_col)
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        let score = jaccard(target_name, candidate);
        if score >= 0.7 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

fn phone_coverage(rows: &[MergedRow]) -> f64 {
    if rows.is_empty() {
        return 1.0;
    }
    let with_phone = rows.iter().filter(|r| r.phone_number.is_some() || r.has_existing_phone()).count();
    with_phone as f64 / rows.len() as f64
}

/// Attach owner records. When `original_index` is present (the only
/// strategy used in practice per spec §4.10), update the row directly and
/// insert one duplicate row per additional owner.
pub fn merge_owners(base: &[(usize, RawRow)], owners: &[OwnerRecord]) -> Vec<MergedRow> {
    let mut by_index: HashMap<usize, &OwnerRecord> = HashMap::new();
    for rec in owners {
        by_index.insert(rec.original_index, rec);
    }

    let mut out = Vec::new();
    for (index, row) in base {
        let mut merged = MergedRow::from_raw(*index, row);
        if let Some(rec) = by_index.get(index) {
            if let Some(first) = rec.owners.first() {
                merged.owner_name = Some(first.clone());
            }
            out.push(merged.clone());
            for extra_owner in rec.owners.iter().skip(1) {
                let mut duplicate = MergedRow::from_raw(*index, row);
                duplicate.owner_name = Some(extra_owner.clone());
                out.push(duplicate);
            }
        } else {
            out.push(merged);
        }
    }
    out
}

impl Clone for MergedRow {
    fn clone(&self) -> Self {
        Self {
            original_index: self.original_index,
            cells: self.cells.clone(),
            owner_name: self.owner_name.clone(),
            phone_number: self.phone_number.clone(),
        }
    }
}

/// Attach phone records to already-owner-merged (or raw) rows, trying the
/// four strategies in order, re-sorting by `original_index` at the end
/// (spec §4.10, §5 ordering guarantee).
pub fn merge_phones(
    rows: Vec<MergedRow>,
    phones: &[PhoneRecord],
    name_col: &str,
    address_col: &str,
) -> Vec<MergedRow> {
    let indexed: std::collections::HashSet<usize> = rows.iter().map(|r| r.original_index).collect();

    // A row can carry more than one surviving phone number (the §4.9 row
    // explosion table can produce both a primary and a secondary mobile
    // number for the same row); attach the first to the row itself and
    // duplicate the row per additional number, mirroring merge_owners.
    let mut by_index: HashMap<usize, Vec<&PhoneRecord>> = HashMap::new();
    let mut unindexed_targets: Vec<&PhoneRecord> = Vec::new();
    for rec in phones {
        if indexed.contains(&rec.original_index) {
            by_index.entry(rec.original_index).or_default().push(rec);
        } else {
            unindexed_targets.push(rec);
        }
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match by_index.get(&row.original_index) {
            Some(recs) if !row.has_existing_phone() => {
                let mut first = row.clone();
                first.phone_number = Some(recs[0].primary_phone.clone());
                out.push(first);
                for rec in &recs[1..] {
                    let mut duplicate = row.clone();
                    duplicate.phone_number = Some(rec.primary_phone.clone());
                    out.push(duplicate);
                }
            }
            _ => out.push(row),
        }
    }

    // PhoneRecord always carries original_index in this pipeline, so the
    // similarity-based fallbacks below exist for scraped records that lack
    // one but are not hit on the pipeline's own happy path.
    for rec in unindexed_targets {
        let coverage = phone_coverage(&out);
        let target = if let Some(i) = match_by_name_address(&rec.matched_address, &rec.matched_address, &out, name_col, address_col) {
            Some(i)
        } else if let Some(i) = match_by_fuzzy_prefix(&rec.matched_address, &out, name_col) {
            Some(i)
        } else if coverage < 0.3 {
            match_by_jaccard(&rec.matched_address, &out, name_col)
        } else {
            None
        };

        if let Some(i) = target {
            if out[i].phone_number.is_none() && !out[i].has_existing_phone() {
                out[i].phone_number = Some(rec.primary_phone.clone());
            }
        }
    }

    out.sort_by_key(|r| r.original_index);
    out
}

pub fn output_filename(original_basename: &str) -> String {
    format!("Merged_{original_basename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, cells: &[(&str, &str)]) -> (usize, RawRow) {
        (
            index,
            RawRow {
                cells: cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            },
        )
    }

    #[test]
    fn stable_index_match_updates_correct_row() {
        let base = vec![row(0, &[("Owner", "JOHN SMITH")]), row(1, &[("Owner", "JANE DOE")])];
        let owners = vec![OwnerRecord { original_index: 1, owners: vec!["JANE DOE".to_string()] }];
        let merged = merge_owners(&base, &owners);
        assert_eq!(merged[1].owner_name.as_deref(), Some("JANE DOE"));
        assert_eq!(merged[0].owner_name, None);
    }

    #[test]
    fn multi_owner_explodes_into_extra_row() {
        let base = vec![row(0, &[("Owner", "BARATZ")])];
        let owners = vec![OwnerRecord {
            original_index: 0,
            owners: vec!["PHILIP BARATZ".to_string(), "LISA BARATZ".to_string()],
        }];
        let merged = merge_owners(&base, &owners);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].original_index, 0);
        assert_eq!(merged[1].original_index, 0);
    }

    #[test]
    fn does_not_overwrite_existing_phone() {
        let base = vec![row(0, &[("Owner", "JOHN SMITH"), ("Phone", "5551234567")])];
        let merged_owners = merge_owners(&base, &[]);
        let phones = vec![PhoneRecord {
            original_index: 0,
            matched_address: String::new(),
            address_match_confidence: 100,
            primary_phone: "5559999999".to_string(),
            secondary_phone: String::new(),
            all_phones: vec![],
        }];
        let merged = merge_phones(merged_owners, &phones, "Owner", "Address");
        assert_eq!(merged[0].phone_number, None);
    }

    #[test]
    fn output_is_resorted_by_original_index() {
        let base = vec![row(0, &[("Owner", "A")]), row(1, &[("Owner", "B")])];
        let merged_owners = merge_owners(&base, &[]);
        let phones = vec![
            PhoneRecord { original_index: 1, primary_phone: "5551112222".to_string(), ..Default::default() },
            PhoneRecord { original_index: 0, primary_phone: "5553334444".to_string(), ..Default::default() },
        ];
        let merged = merge_phones(merged_owners, &phones, "Owner", "Address");
        assert_eq!(merged[0].original_index, 0);
        assert_eq!(merged[1].original_index, 1);
    }

    #[test]
    fn filename_is_deterministic() {
        assert_eq!(output_filename("leads.csv"), "Merged_leads.csv");
    }

    #[test]
    fn dual_mobile_numbers_explode_into_extra_row() {
        let base = vec![row(0, &[("Owner", "A")])];
        let merged_owners = merge_owners(&base, &[]);
        let phones = vec![
            PhoneRecord { original_index: 0, primary_phone: "5551112222".to_string(), ..Default::default() },
            PhoneRecord { original_index: 0, primary_phone: "5553334444".to_string(), ..Default::default() },
        ];
        let merged = merge_phones(merged_owners, &phones, "Owner", "Address");
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|r| r.original_index == 0));
        let mut numbers: Vec<&str> = merged.iter().filter_map(|r| r.phone_number.as_deref()).collect();
        numbers.sort();
        assert_eq!(numbers, ["5551112222", "5553334444"]);
    }
}
