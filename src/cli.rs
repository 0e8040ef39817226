use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "A live terminal dashboard for Kubernetes pods, statefulsets, CRDs and namespaces."
)]
pub struct CliArgs {
    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// List refresh interval in milliseconds
    #[arg(long)]
    pub refresh_ms: Option<u64>,

    /// Log polling interval in milliseconds
    #[arg(long)]
    pub log_poll_ms: Option<u64>,

    /// Deadline for each Kubernetes API call in milliseconds
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Directory where log snapshots are saved
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Kubeconfig file to use instead of the default discovery
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to connect with
    #[arg(long)]
    pub context: Option<String>,

    /// Settings file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append diagnostics to this file; discarded otherwise
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
