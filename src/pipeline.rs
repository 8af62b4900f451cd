//! End-to-end job orchestration tying the enrichment components together
//! into the Ingest / Analyze / Download modes (spec §6 external interfaces).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::error::PipelineError;
use crate::formula;
use crate::merge::{self, MergedRow};
use crate::models::{PhoneLabel, PhoneRecord, RawRow, StandardizedRow};
use crate::phone;
use crate::reader;
use crate::workers::analyze_pool;
use crate::workspace::Workspace;

const ASSESSOR_BASE_URL: &str = "https://bcpa.net/RecInfo.asp";
const PEOPLE_SEARCH_BASE_URL: &str = "https://www.fastpeoplesearch.com/name";
const ANALYZE_CONCURRENCY: usize = 4;

fn write_staging_csv(path: &Path, rows: &[StandardizedRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "original_index",
        "cleaned_name",
        "street_address",
        "city",
        "state",
        "search_format",
        "has_existing_phone",
        "existing_primary",
        "existing_secondary",
        "eligible",
    ])?;
    for row in rows {
        writer.write_record([
            row.original_index.to_string(),
            row.cleaned_name.clone(),
            row.street_address.clone(),
            row.city.clone(),
            row.state.clone(),
            row.search_format.clone(),
            row.has_existing_phone.to_string(),
            row.existing_primary.clone(),
            row.existing_secondary.clone(),
            row.eligible.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn read_staging_csv(path: &str) -> Result<Vec<StandardizedRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(StandardizedRow {
            original_index: record.get(0).unwrap_or("0").parse().unwrap_or(0),
            cleaned_name: record.get(1).unwrap_or("").to_string(),
            street_address: record.get(2).unwrap_or("").to_string(),
            city: record.get(3).unwrap_or("").to_string(),
            state: record.get(4).unwrap_or("").to_string(),
            search_format: record.get(5).unwrap_or("").to_string(),
            has_existing_phone: record.get(6).unwrap_or("false").parse().unwrap_or(false),
            existing_primary: record.get(7).unwrap_or("").to_string(),
            existing_secondary: record.get(8).unwrap_or("").to_string(),
            eligible: record.get(9).unwrap_or("false").parse().unwrap_or(false),
        });
    }
    Ok(rows)
}

fn write_merged_csv(path: &Path, rows: &[MergedRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header: Vec<String> = rows
        .first()
        .map(|r| r.cells.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default();
    header.push("Owner Name".to_string());
    header.push("Phone Number".to_string());
    writer.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = row.cells.iter().map(|(_, v)| v.clone()).collect();
        record.push(row.owner_name.clone().unwrap_or_default());
        record.push(row.phone_number.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Ingest mode: read the uploaded file, infer its schema, apply the
/// extraction formula, and write the staging table (spec §4.1/§4.4/§4.5).
pub async fn run_ingest(config: &Config, workspace: &Workspace, input_path: &str) -> Result<PathBuf> {
    let rows = reader::read_file(input_path).map_err(anyhow::Error::from)?;
    let columns: Vec<String> = rows
        .first()
        .map(|(_, row)| row.cells.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default();
    let raw_rows: Vec<RawRow> = rows.iter().map(|(_, row)| row.clone()).collect();

    let client = crate::utils::create_client(None, "lead-enrich/0.1")?;
    let formula = formula::infer(&client, &config.llm_endpoint, &config.llm_api_key, &columns, &raw_rows).await;

    info!(
        records_with_phones = formula.records_with_phones,
        records_processable = formula.records_processable,
        confidence = ?formula.confidence,
        "schema inference complete"
    );

    let standardized = formula::apply(&rows, &formula);

    workspace.ensure_dirs().await?;
    let staging_name = format!("phone_ready_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    let staging_path = workspace.temp_dir().join(&staging_name);
    write_staging_csv(&staging_path, &standardized)?;

    Ok(staging_path)
}

/// Analyze mode: scrape owners and mobile phones for eligible staged rows,
/// validate the phones, and merge everything back onto the original file
/// (spec §4.6-§4.10).
pub async fn run_analyze(
    config: &Config,
    workspace: &Workspace,
    staging_file: &str,
    max_records: usize,
    original_input_path: &str,
) -> Result<PathBuf> {
    let mut rows = read_staging_csv(staging_file)?;
    rows.retain(|r| r.eligible && !r.has_existing_phone);
    rows.truncate(max_records);

    if rows.is_empty() {
        return Err(PipelineError::NoResults { original_index: 0 }.into());
    }

    let outcome = analyze_pool(
        rows.clone(),
        config,
        ASSESSOR_BASE_URL,
        PEOPLE_SEARCH_BASE_URL,
        ANALYZE_CONCURRENCY,
    )
    .await;

    let client = crate::utils::create_client(None, "lead-enrich/0.1")?;
    let all_numbers: Vec<String> = outcome
        .phones
        .iter()
        .flat_map(|p| {
            let mut numbers = vec![p.primary_phone.clone()];
            if !p.secondary_phone.is_empty() {
                numbers.push(p.secondary_phone.clone());
            }
            numbers
        })
        .filter(|n| !n.is_empty())
        .collect();
    let labels = phone::validate_batch(
        &client,
        &config.phone_classifier_endpoint,
        &config.phone_classifier_api_key,
        &all_numbers,
    )
    .await;
    let label_by_number: std::collections::HashMap<&str, PhoneLabel> =
        all_numbers.iter().map(|n| n.as_str()).zip(labels.iter().copied()).collect();

    let mut phone_records = Vec::new();
    for row in &rows {
        let Some(phone_rec) = outcome.phones.iter().find(|p| p.original_index == row.original_index) else {
            continue;
        };
        let primary_label = (!phone_rec.primary_phone.is_empty())
            .then(|| label_by_number.get(phone_rec.primary_phone.as_str()).copied())
            .flatten();
        let secondary_label = (!phone_rec.secondary_phone.is_empty())
            .then(|| label_by_number.get(phone_rec.secondary_phone.as_str()).copied())
            .flatten();

        for exploded in phone::explode_row(
            row.original_index,
            &phone_rec.primary_phone,
            &phone_rec.secondary_phone,
            primary_label,
            secondary_label,
        ) {
            phone_records.push(PhoneRecord {
                original_index: exploded.original_index,
                matched_address: phone_rec.matched_address.clone(),
                address_match_confidence: phone_rec.address_match_confidence,
                primary_phone: exploded.phone_number.clone(),
                secondary_phone: String::new(),
                all_phones: vec![exploded.phone_number],
            });
        }
    }

    let base_rows = reader::read_file(original_input_path).map_err(anyhow::Error::from)?;
    let merged_owners = merge::merge_owners(&base_rows, &outcome.owners);
    let merged = merge::merge_phones(merged_owners, &phone_records, "", "");

    let basename = Path::new(original_input_path)
        .file_name()
        .ok_or_else(|| anyhow!("input path has no file name: {original_input_path}"))?
        .to_string_lossy()
        .to_string();
    workspace.ensure_dirs().await?;
    let output_path = workspace.results_dir().join(merge::output_filename(&basename));
    write_merged_csv(&output_path, &merged)?;

    Ok(output_path)
}

/// Download mode: resolve the finished output file and trigger the
/// post-download temp-file cleanup (spec §4.11).
pub async fn run_download(workspace: &Workspace, filename: &str) -> Result<PathBuf> {
    let path = workspace.results_dir().join(filename);
    if !path.exists() {
        return Err(anyhow!("no such result file: {filename}"));
    }
    workspace.cleanup_temp_batches().await?;
    Ok(path)
}
