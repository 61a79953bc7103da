pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "strato")]
#[command(about = "Strato - stacked branch management for Git")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize repository for Strato
    Init {
        /// Trunk branch the stack is ultimately based on
        #[arg(long)]
        trunk: Option<String>,
    },

    /// Create a new layer on top of the current branch
    Add {
        /// Branch name for the new layer
        name: String,

        /// Parent branch (defaults to the current branch)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Rename a tracked layer (local branch, remote branch, stack entry)
    Rename {
        /// Current branch name
        old: String,
        /// New branch name
        new: String,
    },

    /// Merge a layer into its parent branch
    Merge {
        /// Layer to merge (defaults to the current branch)
        name: Option<String>,
    },

    /// Rebase every layer onto its parent and prune merged branches
    Update,

    /// Rebase the current layer onto its parent
    Rebase,

    /// Push the current branch to the remote
    Push,

    /// Show the stack tree
    View,

    /// Move down the stack to the parent layer
    Down,

    /// Move up the stack to a child layer
    Up,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Lifecycle hooks management
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., trunk_branch, server.url)
        key: String,
        /// Configuration value
        value: String,

        /// Write to the user-wide config instead of the repository config
        #[arg(long)]
        global: bool,
    },

    /// Get a resolved configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List all resolved configuration values
    List,
}

/// Lifecycle hooks actions
#[derive(Debug, Subcommand)]
pub enum HooksAction {
    /// Register a script for a lifecycle event
    Add {
        /// Event name (createLayer, renameLayer, mergeLayer, updateStack)
        event: String,
        /// Script path, relative to the repository root
        script: String,
    },

    /// Remove a registered hook
    Remove {
        /// Event name
        event: String,
        /// Script path as registered
        script: String,
    },

    /// List registered hooks
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Set up logging based on verbosity
        self.setup_logging();

        match self.command {
            Commands::Init { trunk } => commands::init::run(trunk).await,
            Commands::Add { name, parent } => commands::layer::add(&name, parent.as_deref()).await,
            Commands::Rename { old, new } => commands::layer::rename(&old, &new).await,
            Commands::Merge { name } => commands::layer::merge(name.as_deref()).await,
            Commands::Update => commands::update::run().await,
            Commands::Rebase => commands::update::rebase_current().await,
            Commands::Push => commands::push::run().await,
            Commands::View => commands::view::run().await,
            Commands::Down => commands::navigate::down().await,
            Commands::Up => commands::navigate::up().await,
            Commands::Config { action } => commands::config::run(action).await,
            Commands::Hooks { action } => commands::hooks::run(action).await,
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
