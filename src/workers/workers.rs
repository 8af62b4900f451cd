//! Concurrency layer for the analyze stage (spec §5): a bounded pool of
//! workers, each owning one browser session at a time, pulling standardized
//! rows off a channel and feeding assessor + people-search lookups in turn.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::config::{Config, ProxyConfig};
use crate::models::{Counters, OwnerRecord, PhoneRecord, StandardizedRow};
use crate::scraper::{assessor, browser, people_search};
use crate::workers::ProgressBars;

/// Everything a completed analyze run produced, indexed by original row.
#[derive(Debug, Default, Clone)]
pub struct AnalyzeOutcome {
    pub owners: Vec<OwnerRecord>,
    pub phones: Vec<PhoneRecord>,
}

async fn analyze_row(
    row: &StandardizedRow,
    config: &Config,
    assessor_url: &str,
    people_search_url: &str,
    proxy: Option<&ProxyConfig>,
) -> (Option<OwnerRecord>, Option<PhoneRecord>) {
    let session_id = row.original_index.to_string();

    let owner = match browser::acquire(&config.webdriver_url, proxy, &session_id).await {
        Ok(session) => {
            let outcome =
                assessor::lookup_owner(&session, assessor_url, &row.search_format, row.original_index).await;
            session.close().await;
            match outcome {
                assessor::LookupOutcome::Owner(rec) => Some(rec),
                _ => None,
            }
        }
        Err(e) => {
            warn!(error = %e, row = row.original_index, "failed to acquire browser session for assessor lookup");
            None
        }
    };

    let name_tokens: Vec<&str> = row.cleaned_name.split_whitespace().collect();
    if name_tokens.is_empty() {
        return (owner, None);
    }
    let first = name_tokens[0];
    let last = name_tokens[name_tokens.len() - 1];

    let phone = match browser::acquire(&config.webdriver_url, proxy, &session_id).await {
        Ok(session) => {
            let rec = people_search::lookup_phones(
                &session,
                people_search_url,
                first,
                last,
                &row.city,
                &row.state,
                &row.search_format,
                row.original_index,
            )
            .await;
            session.close().await;
            rec
        }
        Err(e) => {
            warn!(error = %e, row = row.original_index, "failed to acquire browser session for people-search lookup");
            None
        }
    };

    (owner, phone)
}

/// Run the analyze stage over `rows`, bounded to `concurrency` simultaneous
/// browser sessions, reporting progress as rows complete (spec §5, §4.6-4.8).
pub async fn analyze_pool(
    rows: Vec<StandardizedRow>,
    config: &Config,
    assessor_url: &str,
    people_search_url: &str,
    concurrency: usize,
) -> AnalyzeOutcome {
    let total = rows.len() as u64;
    let counters = Arc::new(Counters::new());
    let progress = ProgressBars::new(total);

    let (job_tx, job_rx): (Sender<StandardizedRow>, Receiver<StandardizedRow>) = async_channel::unbounded();
    for row in rows {
        if let Err(e) = job_tx.send(row).await {
            error!(error = %e, "failed to queue row for analysis");
        }
    }
    job_tx.close();

    let outcome = Arc::new(Mutex::new(AnalyzeOutcome::default()));
    let worker_count = concurrency.max(1);
    let mut handles = Vec::with_capacity(worker_count);

    for worker_index in 0..worker_count {
        let job_rx = job_rx.clone();
        let outcome = Arc::clone(&outcome);
        let counters = Arc::clone(&counters);
        let progress = progress.clone();
        let config = config.clone();
        let assessor_url = assessor_url.to_string();
        let people_search_url = people_search_url.to_string();
        let proxy = if config.proxies.is_empty() {
            None
        } else {
            Some(config.proxies[worker_index % config.proxies.len()].clone())
        };

        handles.push(tokio::spawn(async move {
            while let Ok(row) = job_rx.recv().await {
                counters.requests.fetch_add(1, Ordering::Relaxed);
                let (owner, phone) =
                    analyze_row(&row, &config, &assessor_url, &people_search_url, proxy.as_ref()).await;

                if owner.is_none() && phone.is_none() {
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                } else {
                    counters.success.fetch_add(1, Ordering::Relaxed);
                }

                let (found, latest) = {
                    let mut guard = outcome.lock().await;
                    let mut latest = None;
                    if let Some(owner) = owner {
                        latest = owner.owners.first().cloned();
                        guard.owners.push(owner);
                    }
                    if let Some(phone) = phone {
                        if latest.is_none() {
                            latest = Some(phone.primary_phone.clone());
                        }
                        guard.phones.push(phone);
                    }
                    ((guard.owners.len() + guard.phones.len()) as u64, latest)
                };

                let completed = counters.requests.load(Ordering::Relaxed) as u64;
                progress.update_progress(completed, None);
                progress.update_stats(&counters, 0);
                progress.update_found(found, latest.as_deref());
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "analyze worker task panicked");
        }
    }

    let result = outcome.lock().await.clone();
    progress.finish((result.owners.len() + result.phones.len()) as u64, None);
    result
}
