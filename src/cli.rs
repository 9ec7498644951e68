use std::path::PathBuf;

use clap::{Parser, Subcommand};

use scan_review_core::Persona;
use scan_review_llm::ProviderType;

/// Top-level CLI parser for the `scan-review` binary.
#[derive(Debug, Parser)]
#[command(
    name = "scan-review",
    version,
    about = "AI-assisted review of multi-image scans"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print results as a JSON command response
    #[arg(long, global = true)]
    pub json: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new case with a generated patient reference
    Start,
    /// Edit the patient reference or clinical context
    Intake {
        #[arg(long = "ref")]
        patient_ref: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },
    /// Analyse scan images, in the order given
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Clinical context for this run (defaults to the intake context)
        #[arg(long)]
        context: Option<String>,
    },
    /// Show the live case
    Show,
    /// Accept a finding into the report
    Accept { finding_id: String },
    /// Reject a finding
    Reject { finding_id: String },
    /// Switch the acting persona
    Persona { persona: Persona },
    /// Send the case to a peer reviewer
    RequestReview {
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Write or submit second opinion notes
    Review {
        notes: String,
        /// Save the notes without submitting the review
        #[arg(long)]
        draft: bool,
    },
    /// Finalize the report
    Finalize,
    /// Plain-language report for the patient
    Translate,
    /// Print or replace the report
    Report {
        /// Replace the report text
        #[arg(long)]
        set: Option<String>,
        /// Show the patient view
        #[arg(long, conflicts_with = "set")]
        patient: bool,
    },
    /// Clear the analysis results
    Reset,
    /// Store or delete a provider API key
    SetKey {
        provider: ProviderType,
        #[arg(required_unless_present = "delete")]
        key: Option<String>,
        #[arg(long)]
        delete: bool,
    },
    /// Show or change settings
    Config {
        #[arg(long)]
        provider: Option<ProviderType>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        exam_title: Option<String>,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        require_peer_review: Option<bool>,
        /// Restore defaults
        #[arg(long, conflicts_with_all = ["provider", "model", "batch_size"])]
        reset: bool,
    },
    /// Check backend services
    Health,
}
