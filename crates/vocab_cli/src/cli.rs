use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vocab",
    about = "Vocabulary registry: reconcile vocabulary trees against current and draft views",
    version
)]
pub struct Cli {
    /// Registry database file (defaults to `VOCAB_DB_PATH`, then the temp dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Actor recorded on every written row
    #[arg(long, global = true, default_value = "cli")]
    pub actor: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print core linkage information
    Ping,

    /// Create a vocabulary from a JSON tree without an id
    Create {
        /// Path to the vocabulary tree JSON
        file: PathBuf,
    },

    /// Apply a JSON tree to the current or draft view of a vocabulary
    Apply {
        /// Vocabulary ID
        id: i64,

        /// Path to the vocabulary tree JSON; `status: draft` targets the draft
        file: PathBuf,
    },

    /// Print the current (or draft) tree as JSON
    Show {
        /// Vocabulary ID
        id: i64,

        /// Show the draft view instead of the current view
        #[arg(long)]
        draft: bool,

        /// Print the root row only
        #[arg(long)]
        root_only: bool,
    },

    /// Print one diagnostic line per stored row
    Describe {
        /// Vocabulary ID
        id: i64,
    },

    /// Historicize the current view
    DeleteCurrent {
        /// Vocabulary ID
        id: i64,

        /// Keep editing: copy the current tree into a draft when none exists
        #[arg(long)]
        preserve_draft: bool,
    },

    /// Discard the draft view
    DeleteDraft {
        /// Vocabulary ID
        id: i64,
    },

    /// Move the current tree into the draft view
    PromoteDraft {
        /// Vocabulary ID
        id: i64,
    },

    /// List workflow tasks scheduled for a vocabulary
    Tasks {
        /// Vocabulary ID
        id: i64,
    },
}
