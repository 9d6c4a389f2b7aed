use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::SortMode;

#[derive(Parser)]
#[command(name = "zonedeck")]
#[command(about = "Browse, search and open zones from a remote manifest", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Workspace directory (config, storage, session). Default: $ZONEDECK_WORKSPACE or .zonedeck
    #[arg(long, global = true)]
    pub(crate) workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load the catalog and print it as a grid.
    List {
        /// Sort mode: name | id | popular (defaults to the last one used)
        #[arg(short, long)]
        sort: Option<SortMode>,
        /// Case-insensitive substring filter on zone names
        #[arg(short = 'q', long)]
        search: Option<String>,
        /// Print cover URLs under each entry
        #[arg(long)]
        covers: bool,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Open a zone in the viewer. Without an id, reopens the zone in the page location.
    Open {
        id: Option<String>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },

    /// Hide the viewer and clear its frame.
    Close,

    /// Serve the zone browser page locally.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Settings and data panel.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Inspect or initialize the workspace config.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum SettingsCommand {
    /// Toggle dark mode for the served page.
    DarkMode,
    /// Show contact information.
    Contact,
    /// Show the privacy policy.
    Privacy,
    /// Export local storage and cookies to <epoch-ms>.data.
    Export {
        /// Directory to write into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Import a previously exported data file.
    Import { file: PathBuf },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    /// Print the effective config as JSON.
    Show,
    /// Write the default config into the workspace (refuses to overwrite).
    Init,
}
