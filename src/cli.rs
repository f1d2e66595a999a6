use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Data directory holding config.yaml, the model cache, and the index
    #[clap(short, long, default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start semdex as an HTTP service.
    Daemon {},

    /// Index a document.
    Index {
        /// Document identifier (unique per logical document)
        #[clap(short, long)]
        id: String,

        /// Document text
        #[clap(short, long)]
        text: Option<String>,

        /// File to extract text from instead of --text
        #[clap(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Search indexed documents by semantic similarity.
    Search {
        /// Free-text query
        query: String,

        /// Number of results to return
        #[clap(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Print index statistics.
    Stats {},
}
