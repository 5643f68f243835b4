//! `clubhouse`: command-line client for the Clubhouse API.
//!
//! # Usage
//!
//! ```
//! clubhouse --url http://localhost:8080 --user u1 mine --category Books
//! clubhouse --config ~/.config/clubhouse/config.toml join <club-id>
//! ```

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, CreateClub};
use clubhouse_chat::token::{HttpTokenSource, TokenSource};
use clubhouse_core::club::Club;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "clubhouse", about = "Browse and join clubs")]
struct Args {
  /// Path to a TOML config file (url, user).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the clubhouse server (default: http://localhost:8080).
  #[arg(long, env = "CLUBHOUSE_URL")]
  url: Option<String>,

  /// User id to act as.
  #[arg(long, env = "CLUBHOUSE_USER")]
  user: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every club.
  List,

  /// Show your clubs: created, joined, and joinable.
  Mine {
    /// Only show joinable clubs in this category.
    #[arg(long)]
    category: Option<String>,
    /// Only show joinable clubs matching this text.
    #[arg(short, long)]
    query:    Option<String>,
  },

  /// Create a club led by you.
  Create {
    name:        String,
    #[arg(long)]
    category:    String,
    #[arg(long, default_value = "")]
    description: String,
    /// Repeatable.
    #[arg(long = "tag")]
    tags:        Vec<String>,
    /// Display name shown as leader.
    #[arg(long)]
    leader_name: Option<String>,
    #[arg(long)]
    private:     bool,
    #[arg(long)]
    capacity:    Option<u32>,
  },

  /// Join a club.
  Join { club_id: Uuid },

  /// Leave a club.
  Leave { club_id: Uuid },

  /// Delete a club you lead.
  Delete { club_id: Uuid },

  /// Fetch a chat session token for yourself.
  Token,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  url:  String,
  #[serde(default)]
  user: String,
}

/// CLI flags override the config file, which overrides defaults.
fn resolve(url: Option<String>, user: Option<String>, file: &ConfigFile) -> ApiConfig {
  ApiConfig {
    base_url: url
      .or_else(|| (!file.url.is_empty()).then(|| file.url.clone()))
      .unwrap_or_else(|| DEFAULT_URL.to_string()),
    user_id:  user
      .or_else(|| (!file.user.is_empty()).then(|| file.user.clone()))
      .unwrap_or_default(),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let api_config = resolve(args.url, args.user, &file_cfg);
  let client = ApiClient::new(api_config.clone())?;

  match args.command {
    Command::List => {
      for club in client.list_clubs().await? {
        print_club(&club);
      }
    }
    Command::Mine { category, query } => {
      let p = client.my_clubs(category.as_deref(), query.as_deref()).await?;
      print_section("Created", &p.created);
      print_section("Joined", &p.joined);
      print_section("Featured", &p.featured);
      print_section("Joinable", &p.joinable);
    }
    Command::Create {
      name,
      category,
      description,
      tags,
      leader_name,
      private,
      capacity,
    } => {
      let club = client
        .create_club(&CreateClub {
          name,
          category,
          description,
          tags,
          leader_name,
          private,
          capacity,
        })
        .await?;
      println!("created {}", club.club_id);
    }
    Command::Join { club_id } => {
      client.join(club_id).await?;
      println!("joined {club_id}");
    }
    Command::Leave { club_id } => {
      client.leave(club_id).await?;
      println!("left {club_id}");
    }
    Command::Delete { club_id } => {
      client.delete(club_id).await?;
      println!("deleted {club_id}");
    }
    Command::Token => {
      anyhow::ensure!(!api_config.user_id.is_empty(), "no user id; pass --user or set CLUBHOUSE_USER");
      let source = HttpTokenSource::new(client.base_url()).context("building token client")?;
      let token = source
        .fetch_token(&api_config.user_id)
        .await
        .with_context(|| format!("POST {} failed", source.endpoint()))?;
      println!("{}", token.as_str());
    }
  }

  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_section(title: &str, clubs: &[Club]) {
  println!("{title} ({})", clubs.len());
  for club in clubs {
    print!("  ");
    print_club(club);
  }
}

fn print_club(club: &Club) {
  let capacity = club
    .capacity
    .map(|c| format!("{}/{c}", club.member_count()))
    .unwrap_or_else(|| club.member_count().to_string());
  let badge = if club.verified { " ✓" } else { "" };
  println!(
    "{}  {}{badge}  [{}]  {capacity} members  led by {}",
    club.club_id, club.name, club.category, club.leader_name
  );
}
