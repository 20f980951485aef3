//! CLI module - Command-line interface for anicatalog
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// anicatalog - Anime and movie streaming catalog
#[derive(Parser)]
#[command(name = "anicatalog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web API server (default)
    #[command(alias = "web", alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// List catalog titles
    #[command(alias = "ls", alias = "l")]
    List {
        /// Section filter (popular, hindi_dub, telugu_dub, new_anime, movies)
        #[arg(long)]
        section: Option<String>,
        /// Exact category filter
        #[arg(long)]
        category: Option<String>,
        /// Sort key (title, category, rating)
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// List movies, newest release first
    #[command(alias = "m")]
    Movies,

    /// Search titles by name, synopsis or category
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Show recently released episodes
    #[command(alias = "new")]
    NewEpisodes {
        /// Window in days (default: catalog.new_episode_window_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Recommend titles similar to one title
    #[command(alias = "rec")]
    Recommend {
        /// Title ID
        id: String,
        /// Comma separated watch history, most recent first
        #[arg(long, value_delimiter = ',')]
        history: Vec<String>,
    },

    /// Show catalog status
    Status,
}

pub use commands::*;
