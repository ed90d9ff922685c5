use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_QUESTIONNAIRE: &str = "questionnaire.yaml";

#[derive(Parser, Debug)]
#[command(name = "rmf-audit", version, about = "Guided AI RMF conformity audits")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_QUESTIONNAIRE,
        help = "Questionnaire file (.json, .yaml or .yml)"
    )]
    pub questionnaire: PathBuf,
    #[arg(long, global = true, help = "Engine config file (.json, .yaml or .yml)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the full-conformity coverage threshold")]
    pub full_threshold: Option<f64>,
    #[arg(long, global = true, help = "Override the partial-conformity coverage threshold")]
    pub partial_threshold: Option<f64>,
    #[arg(short, long, global = true, help = "Log debug events to stderr")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List categories that have questions
    Categories,
    /// List the questions of one category
    Questions { category: String },
    /// Check the questionnaire and config, reporting dropped rows
    Validate,
    /// Score one piece of evidence against a baseline
    Score {
        #[arg(long)]
        baseline: String,
        #[arg(long)]
        evidence: String,
        #[arg(long, help = "Category the question belongs to (required with --assisted)")]
        category: Option<String>,
        #[command(flatten)]
        assist: AssistArgs,
    },
    /// Run an interactive interview for one category on stdin
    Interview {
        category: String,
        #[command(flatten)]
        assist: AssistArgs,
    },
    /// Route free-text chat messages from stdin, one per line
    Chat {
        #[arg(long, default_value = "cli")]
        conversation: String,
    },
    /// Replay scripted answers and print the session summaries
    Replay {
        script: PathBuf,
        #[command(flatten)]
        assist: AssistArgs,
    },
    /// Replay scripted answers and print the assessment
    Assess {
        script: PathBuf,
        #[command(flatten)]
        assist: AssistArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AssistArgs {
    #[arg(long, help = "Ask a language model for verdicts, falling back to the keyword heuristic")]
    pub assisted: bool,
    #[arg(long, requires = "assisted", help = "Runtime config for assisted evaluation")]
    pub runtime_config: Option<PathBuf>,
}
