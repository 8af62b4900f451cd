use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;

pub const MAX_RETRIES: usize = 3;

/// Shared atomic counters for a worker pool's progress bar (unchanged from
/// the teacher's phone-lookup worker pool, generalized to scraper batches).
pub struct Counters {
    pub requests: AtomicUsize,
    pub success: AtomicUsize,
    pub errors: AtomicUsize,
    pub ratelimits: AtomicUsize,
    pub hits: AtomicUsize,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub fn new() -> Self {
        Self {
            requests: AtomicUsize::new(0),
            success: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            ratelimits: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }
}

/// An untyped record as read from the input file (spec §3).
///
/// Column order is preserved so positional-format inference can fall back to
/// index-based access when header names are synthetic.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    SeparatedComponents,
    CombinedAddress,
    Positional,
    Mixed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMethod {
    SeparatedComponents,
    ParseCombined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Semantic fields a column can be mapped to (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticField {
    PrimaryName,
    HouseNumber,
    PrefixDirection,
    StreetName,
    StreetType,
    PostDirection,
    Unit,
    CombinedAddress,
    City,
    State,
    Zip,
}

/// The output of format inference for a given input file. Immutable once
/// produced (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionFormula {
    pub format_type: FormatType,
    pub column_map: HashMap<SemanticField, String>,
    pub existing_phone_columns: Vec<String>,
    pub address_method: AddressMethod,
    pub confidence: Confidence,
    pub validation_notes: String,
    /// Empirically observed counts, filled in by the post-validation pass
    /// described in §4.4.
    pub records_with_phones: usize,
    pub records_processable: usize,
}

impl ExtractionFormula {
    pub fn column_for(&self, field: SemanticField) -> Option<&str> {
        self.column_map.get(&field).map(|s| s.as_str())
    }
}

/// Derived from RawRow + ExtractionFormula (spec §3, §4.5).
#[derive(Debug, Clone, Default)]
pub struct StandardizedRow {
    pub original_index: usize,
    pub cleaned_name: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub search_format: String,
    pub has_existing_phone: bool,
    pub existing_primary: String,
    pub existing_secondary: String,
    pub eligible: bool,
}

impl StandardizedRow {
    /// A row is worth keeping in the staging table only if it carries a
    /// usable name or a usable address (spec §4.5 step 7).
    pub fn is_usable(&self) -> bool {
        !self.cleaned_name.is_empty() || !self.street_address.is_empty()
    }
}

/// Output of assessor scraping (spec §3, §4.6).
#[derive(Debug, Clone)]
pub struct OwnerRecord {
    pub original_index: usize,
    pub owners: Vec<String>,
}

/// Output of people-search scraping (spec §3, §4.7). Mobile-only.
#[derive(Debug, Clone, Default)]
pub struct PhoneRecord {
    pub original_index: usize,
    pub matched_address: String,
    pub address_match_confidence: u8,
    pub primary_phone: String,
    pub secondary_phone: String,
    pub all_phones: Vec<String>,
}

/// A phone number tagged by the mobile-vs-landline classifier (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneLabel {
    Mobile,
    Landline,
    Invalid,
}

/// A person-card candidate's phone-category tag on the people-search result
/// page (spec §4.7 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneCategory {
    Mobile,
    Voip,
    Wireless,
    Cellular,
    MobileOrVoip,
}
