use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hierarchy-sync")]
#[command(about = "Export and merge organizational hierarchies between environments")]
pub struct Cli {
    /// Database file (overrides HIERARCHY_SYNC_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Write the whole tree as a JSON document
    Export {
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Merge a JSON document into the database
    Import {
        file: PathBuf,
        /// Skip interval structure validation of the document
        #[arg(long = "trust-document")]
        trust_document: bool,
    },
    /// Verify that every code in the database is unique
    Check,
    /// Print the tree, or the subtree under a code, indented by depth
    Tree {
        #[arg(long)]
        code: Option<String>,
    },
}
