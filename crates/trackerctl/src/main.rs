//! Stat Tracker Control - local operator CLI for the agent stat engine.
//!
//! Resolves an agent from an access token, prints derived views as JSON,
//! submits stat batches, and manages tokens.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::Level;

use tracker_engine::StatEngine;

#[derive(Parser)]
#[command(name = "trackerctl")]
#[command(about = "Agent stat tracker - local operator CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Database path (overrides config file and STATTRACK_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Access token; STATTRACK_TOKEN is used when absent
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an agent and issue its web-session token
    Register {
        /// Agent name (case-preserving, unique)
        name: String,
        /// Faction letter: E or R
        faction: String,
        /// Registered email address
        email: String,
    },

    /// List the stat catalog
    Stats,

    /// Show the resolved agent
    Agent,

    /// Show earned badges
    Badges {
        /// Show upcoming badges instead of earned ones
        #[arg(long)]
        upcoming: bool,

        /// How many upcoming badges to show
        #[arg(long, default_value_t = tracker_engine::session::DEFAULT_UPCOMING_LIMIT)]
        limit: usize,
    },

    /// Show cross-stat ratios
    Ratios,

    /// Show the AP breakdown
    Breakdown,

    /// Show the milestone prediction for a stat
    Prediction { stat: String },

    /// Show graph data for a stat
    Graph { stat: String },

    /// Show the weekly trend for a stat
    Trend {
        stat: String,

        /// this-week or last-week
        #[arg(long, default_value = "this-week")]
        when: String,
    },

    /// Submit stat values as KEY=VALUE pairs
    Submit {
        /// Target date (YYYY-MM-DD); today when absent
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Allow values lower than the committed ones (data corrections)
        #[arg(long)]
        allow_lower: bool,

        /// Stat values, e.g. ap=1234 hacker=10
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Manage access tokens
    Tokens {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// List live token labels
    List,

    /// Create a token; the secret is printed exactly once
    Create { label: String },

    /// Revoke a token by label
    Revoke { label: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .init();

    let cli = Cli::parse();
    let db = config::database_path(cli.db)?;
    let engine = StatEngine::open_at(&db)?;

    // register and stats need no credential
    match &cli.command {
        Commands::Register {
            name,
            faction,
            email,
        } => return commands::register(&engine, name, faction, email),
        Commands::Stats => return commands::stat_catalog(&engine),
        _ => {}
    }

    let token = credential(cli.token)?;
    let mut session = commands::resolve(&engine, &token)?;

    match cli.command {
        Commands::Register { .. } | Commands::Stats => unreachable!("handled above"),
        Commands::Agent => commands::agent(&mut session),
        Commands::Badges { upcoming, limit } => {
            if upcoming {
                commands::upcoming_badges(&mut session, limit)
            } else {
                commands::badges(&mut session)
            }
        }
        Commands::Ratios => commands::ratios(&mut session),
        Commands::Breakdown => commands::breakdown(&session),
        Commands::Prediction { stat } => commands::prediction(&session, &stat),
        Commands::Graph { stat } => commands::graph(&session, &stat),
        Commands::Trend { stat, when } => commands::trend(&session, &stat, &when),
        Commands::Submit {
            date,
            allow_lower,
            values,
        } => commands::submit(&mut session, date, allow_lower, &values),
        Commands::Tokens { action } => match action {
            TokenAction::List => commands::token_list(&mut session),
            TokenAction::Create { label } => commands::token_create(&mut session, &label),
            TokenAction::Revoke { label } => commands::token_revoke(&mut session, &label),
        },
    }
}

fn credential(flag: Option<String>) -> Result<String> {
    if let Some(token) = flag {
        return Ok(token);
    }
    match std::env::var("STATTRACK_TOKEN") {
        Ok(token) if !token.is_empty() => Ok(token),
        _ => bail!("no access token; pass --token or set STATTRACK_TOKEN"),
    }
}
