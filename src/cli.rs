use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List simulations in the catalog
    Sims,

    /// Print the translation form of a simulation
    Form {
        /// Simulation name
        #[arg(short, long)]
        sim: String,

        /// Target language
        #[arg(short, long)]
        lang: String,

        /// Translator user id
        #[arg(short, long)]
        user: u64,

        /// Print keys flattened for nested-object transports
        #[arg(long)]
        transport: bool,
    },

    /// Save form data (JSON) as a draft
    SaveDraft {
        /// Form data file
        #[arg(short, long)]
        file: PathBuf,

        /// Translator user id
        #[arg(short, long)]
        user: u64,
    },

    /// Submit a translation (JSON submission file)
    Submit {
        /// Submission file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Report translation completeness of one simulation
    Report {
        /// Simulation name
        #[arg(short, long)]
        sim: String,

        /// Target language
        #[arg(short, long)]
        lang: String,

        /// Count every string as untranslated
        #[arg(long)]
        untranslated: bool,
    },

    /// Report translation completeness of every simulation in a language
    LanguageReport {
        /// Target language
        #[arg(short, long)]
        lang: String,

        /// Only simulations without any translation, counted as untranslated
        #[arg(long)]
        untranslated: bool,
    },

    /// Evict a cached report
    Flush {
        /// Simulation name
        #[arg(short, long)]
        sim: String,

        /// Target language
        #[arg(short, long)]
        lang: String,
    },
}
