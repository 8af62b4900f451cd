use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Read the input file, infer its schema, and write the staging table.
    Ingest,
    /// Run the scrapers over the staging table and write the merged output.
    Analyze,
    /// Stream a finished output file and trigger workspace cleanup.
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TabType {
    Phone,
    Address,
    #[value(name = "columnSync")]
    ColumnSync,
}

#[derive(Parser, Debug)]
#[command(name = "lead-enrich", about = "Owner/phone enrichment pipeline for property lead lists")]
pub struct Args {
    #[arg(value_enum, help_heading = "REQUIRED")]
    pub mode: Mode,

    /// Path to the uploaded input file (CSV/TSV/XLS/XLSX).
    #[arg(short, long, required_if_eq("mode", "ingest"), help_heading = "INGEST")]
    pub input: Option<String>,

    /// Which upload contract this file was submitted under.
    #[arg(long, value_enum, default_value = "address", help_heading = "INGEST")]
    pub tab_type: TabType,

    /// Free-form analysis label surfaced in job metadata.
    #[arg(long, default_value = "default", help_heading = "ANALYZE")]
    pub analysis_type: String,

    /// Upper bound on eligible rows the scraper will process in one job.
    #[arg(long, default_value_t = 100, help_heading = "ANALYZE")]
    pub max_records: usize,

    /// Staging file produced by a prior ingest run, required in Analyze mode.
    #[arg(long, required_if_eq("mode", "analyze"), help_heading = "ANALYZE")]
    pub staging_file: Option<String>,

    /// Opaque per-visitor identifier; generated if omitted.
    #[arg(long, help_heading = "WORKSPACE")]
    pub user_id: Option<String>,

    /// Root directory for uploads/results/temp workspaces.
    #[arg(long, default_value = "workspace", help_heading = "WORKSPACE")]
    pub workspace_root: String,

    /// Comma-separated host:port:user:pass proxy list (overrides BLAKE_PROXIES).
    #[arg(long, help_heading = "ANALYZE")]
    pub proxies: Option<String>,

    /// Filename to stream, required in Download mode.
    #[arg(long, required_if_eq("mode", "download"), help_heading = "DOWNLOAD")]
    pub filename: Option<String>,
}
