//! User Workspace Manager (spec §4.11 / C11).

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const RETENTION: chrono::Duration = chrono::Duration::days(7);

/// Generate a fresh opaque user identifier for a first-time visitor.
pub fn new_user_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    user_id: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            user_id: user_id.into(),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads").join(&self.user_id)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results").join(&self.user_id)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp").join(&self.user_id)
    }

    /// Create the three per-user directories if they don't already exist.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.uploads_dir(), self.results_dir(), self.temp_dir()] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Delete all temporary batch files embedding this user's identifier,
    /// run after a successful download (spec §4.11).
    pub async fn cleanup_temp_batches(&self) -> std::io::Result<()> {
        let dir = self.temp_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().contains(&self.user_id) {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

fn is_preserved(file_name: &str) -> bool {
    file_name.starts_with("Cleaned_") || file_name.starts_with("Merged_")
}

/// Weekly retention sweep: delete files older than 7 days from all per-user
/// directories under `root`, except files whose names are preserved
/// regardless of age (spec §4.11).
pub async fn run_retention_sweep(root: &Path, now: DateTime<Utc>) -> std::io::Result<usize> {
    let mut deleted = 0usize;
    for top in ["uploads", "results", "temp"] {
        let top_dir = root.join(top);
        let mut user_dirs = match tokio::fs::read_dir(&top_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(user_dir) = user_dirs.next_entry().await? {
            if !user_dir.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(user_dir.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let name = file.file_name().to_string_lossy().to_string();
                if is_preserved(&name) {
                    continue;
                }
                let metadata = file.metadata().await?;
                let modified: DateTime<Utc> = metadata.modified()?.into();
                if now.signed_duration_since(modified) > RETENTION {
                    tokio::fs::remove_file(file.path()).await?;
                    deleted += 1;
                }
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_cleaned_and_merged_prefixes() {
        assert!(is_preserved("Cleaned_leads.csv"));
        assert!(is_preserved("Merged_leads.csv"));
        assert!(!is_preserved("phone_ready_20260101_000000.csv"));
    }

    #[test]
    fn per_user_dirs_are_namespaced() {
        let ws = Workspace::new("/data", "user-123");
        assert_eq!(ws.uploads_dir(), PathBuf::from("/data/uploads/user-123"));
        assert_eq!(ws.results_dir(), PathBuf::from("/data/results/user-123"));
        assert_eq!(ws.temp_dir(), PathBuf::from("/data/temp/user-123"));
    }

    #[tokio::test]
    async fn ensure_dirs_creates_all_three() {
        let base = std::env::temp_dir().join(format!("workspace-test-{}", std::process::id()));
        let ws = Workspace::new(&base, "user-abc");
        ws.ensure_dirs().await.unwrap();
        assert!(ws.uploads_dir().is_dir());
        assert!(ws.results_dir().is_dir());
        assert!(ws.temp_dir().is_dir());
        tokio::fs::remove_dir_all(&base).await.ok();
    }

    #[tokio::test]
    async fn retention_sweep_preserves_recent_and_named_files() {
        let base = std::env::temp_dir().join(format!("workspace-retain-{}", std::process::id()));
        let dir = base.join("results").join("user-xyz");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("Merged_leads.csv"), b"data").await.unwrap();
        tokio::fs::write(dir.join("recent.csv"), b"data").await.unwrap();

        let deleted = run_retention_sweep(&base, Utc::now()).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(dir.join("Merged_leads.csv").exists());
        assert!(dir.join("recent.csv").exists());

        tokio::fs::remove_dir_all(&base).await.ok();
    }
}
