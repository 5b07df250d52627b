use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "complaint-workflow")]
#[command(about = "Lifecycle engine for citizen complaints")]
#[command(long_about = "Drives complaints from submission to resolution: citizens submit and attach \
                       evidence, staff accept, process and close, pimpinan approve execution. \
                       Every command acts as the identity behind --token.")]
pub struct Cli {
    /// Bearer token resolved through the configured identities
    #[arg(long, global = true, help = "Identity token mapped to an actor in the [identities] config")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a new complaint (citizens only)
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        location: String,
        /// Category identifier
        #[arg(long)]
        category: String,
    },
    /// Attach an evidence file reference to a complaint
    Attach {
        /// Complaint id (`12` or `#12`)
        id: String,
        /// Path or URL of the uploaded file
        file_ref: String,
    },
    /// Move a complaint to a new status
    Transition {
        id: String,
        /// Target status: diterima, diproses, dilaksanakan, selesai, ditolak
        status: String,
    },
    /// Show one complaint with its history
    Show { id: String },
    /// List complaints, ordered by id
    List {
        /// Only complaints reported by the calling actor
        #[arg(long)]
        mine: bool,
        /// Only complaints currently in this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Statuses the calling actor may move a complaint to
    Actions { id: String },
    /// Write a default complaint-workflow.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite an existing complaint-workflow.toml")]
        force: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Submit { .. } => "submit",
            Commands::Attach { .. } => "attach",
            Commands::Transition { .. } => "transition",
            Commands::Show { .. } => "show",
            Commands::List { .. } => "list",
            Commands::Actions { .. } => "actions",
            Commands::InitConfig { .. } => "init-config",
        }
    }
}
