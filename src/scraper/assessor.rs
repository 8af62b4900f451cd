//! Assessor Scraper (spec §4.6 / C6): reverse address -> owner lookup,
//! modeled as an explicit state machine per query.

use crate::models::OwnerRecord;
use crate::scraper::browser::{BrowserSession, CONSENT_TIMEOUT, NAVIGATION_TIMEOUT, SELECTOR_TIMEOUT};
use once_cell::sync::Lazy;
use regex::Regex;
use thirtyfour::{By, WebDriver};
use tracing::warn;

const MAX_RETRIES: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Owner(OwnerRecord),
    NotFound,
    Skipped,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Loaded,
    Submitted,
}

static OWNER_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Property Owner\(s\):\s*(.+?)(?:Mailing Address:|$)").unwrap());

fn split_owners(raw: &str) -> Vec<String> {
    let normalized = raw.replace("H/E", " H/E ").replace("H / E", " H/E ");
    let re = Regex::new(r"\s&\s|\sAND\s|;|\s/\s|\bH/E\b").unwrap();
    re.split(&normalized)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// A joint record like `"BARATZ, PHILIP J & LISA T"` splits into
/// `"BARATZ, PHILIP J"` and `"LISA T"` — the second fragment has no surname
/// of its own. When the first fragment is `LAST, FIRST...`, carry that
/// surname onto every later fragment that didn't already bring one.
fn carry_over_surname(fragments: Vec<String>) -> Vec<String> {
    let surname = fragments
        .first()
        .and_then(|f| f.split_once(','))
        .map(|(last, _)| last.trim().to_string());

    let Some(surname) = surname else {
        return fragments;
    };

    fragments
        .into_iter()
        .map(|f| if f.contains(',') { f } else { format!("{surname}, {f}") })
        .collect()
}

fn parse_owner_text(page_text: &str) -> Option<String> {
    OWNER_LABEL_RE
        .captures(page_text)
        .map(|caps| caps[1].trim().to_string())
}

async fn navigate_with_retry(driver: &WebDriver, url: &str) -> anyhow::Result<()> {
    let mut attempt = 0;
    loop {
        match tokio::time::timeout(NAVIGATION_TIMEOUT, driver.goto(url)).await {
            Ok(Ok(())) => return Ok(()),
            _ if attempt < MAX_RETRIES => {
                attempt += 1;
                warn!(url, attempt, "assessor navigation timed out, retrying");
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => anyhow::bail!("navigation to '{url}' timed out after {} retries", MAX_RETRIES),
        }
    }
}

async fn dismiss_consent(driver: &WebDriver) {
    let result = tokio::time::timeout(
        CONSENT_TIMEOUT,
        driver.find(By::XPath("//button[contains(text(), 'I AGREE')]")),
    )
    .await;
    if let Ok(Ok(button)) = result {
        let _ = button.click().await;
    }
}

/// Look up the owner of record for `search_format` via the county assessor
/// site. Eligibility must be checked by the caller before invoking this
/// (spec §4.6: "the scraper must check `StandardizedRow.eligible`").
pub async fn lookup_owner(
    session: &BrowserSession,
    base_url: &str,
    search_format: &str,
    original_index: usize,
) -> LookupOutcome {
    let mut state = State::Init;
    let driver = &session.driver;

    if let Err(e) = navigate_with_retry(driver, base_url).await {
        return LookupOutcome::Error(e.to_string());
    }
    state = State::Loaded;
    debug_assert_eq!(state, State::Loaded);

    dismiss_consent(driver).await;

    let search_box = match tokio::time::timeout(SELECTOR_TIMEOUT, driver.find(By::Name("searchText"))).await {
        Ok(Ok(el)) => el,
        _ => return LookupOutcome::Error("search box not found".to_string()),
    };

    if search_box.send_keys(search_format).await.is_err() {
        return LookupOutcome::Error("failed to enter search text".to_string());
    }
    if search_box.submit().await.is_err() {
        return LookupOutcome::Error("failed to submit search".to_string());
    }
    state = State::Submitted;
    debug_assert_eq!(state, State::Submitted);

    let parcel_heading = tokio::time::timeout(SELECTOR_TIMEOUT, driver.find(By::Css("h2, h1"))).await;
    if parcel_heading.is_err() {
        return LookupOutcome::NotFound;
    }

    // RESULTS list page: click the first result before re-reading as a parcel page.
    if let Ok(Ok(first_result)) =
        tokio::time::timeout(SELECTOR_TIMEOUT, driver.find(By::Css("table tr td a"))).await
    {
        let _ = first_result.click().await;
    }

    let page_text = match driver.source().await {
        Ok(html) => html,
        Err(e) => return LookupOutcome::Error(e.to_string()),
    };

    match parse_owner_text(&page_text) {
        Some(owner_text) => {
            let owners: Vec<String> = carry_over_surname(split_owners(&owner_text))
                .into_iter()
                .map(|o| crate::name::clean(&o))
                .filter(|o| !o.is_empty())
                .collect();
            if owners.is_empty() {
                LookupOutcome::NotFound
            } else {
                LookupOutcome::Owner(OwnerRecord { original_index, owners })
            }
        }
        None => LookupOutcome::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_ampersand_separated_owners() {
        let owners = split_owners("BARATZ PHILIP J & LISA T");
        assert_eq!(owners, vec!["BARATZ PHILIP J", "LISA T"]);
    }

    #[test]
    fn carries_surname_onto_trailing_fragment() {
        let owners = carry_over_surname(split_owners("BARATZ, PHILIP J & LISA T"));
        let cleaned: Vec<String> = owners.into_iter().map(|o| crate::name::clean(&o)).collect();
        assert_eq!(cleaned, vec!["PHILIP BARATZ", "LISA BARATZ"]);
    }

    #[test]
    fn splits_semicolon_separated_owners() {
        let owners = split_owners("SMITH JOHN; DOE JANE");
        assert_eq!(owners, vec!["SMITH JOHN", "DOE JANE"]);
    }

    #[test]
    fn splits_on_provider_he_token() {
        let owners = split_owners("SMITH JOHN H/E DOE JANE");
        assert_eq!(owners.len(), 2);
    }

    #[test]
    fn parses_owner_label_up_to_mailing_address() {
        let page = "Parcel ID: 123\nProperty Owner(s): SMITH JOHN & JANE\nMailing Address: 123 MAIN ST";
        let owner_text = parse_owner_text(page).unwrap();
        assert_eq!(owner_text, "SMITH JOHN & JANE");
    }

    #[test]
    fn returns_none_when_label_absent() {
        assert!(parse_owner_text("no owner information here").is_none());
    }
}
