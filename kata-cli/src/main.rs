use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

use kata_core::{badge_report, country, extract_video_id};
use kata_server::auth::hash_password;
use kata_server::export::submissions_csv;
use kata_server::{Repository, SqliteRepository};

/// Kata challenge operator tools
#[derive(Parser, Debug)]
#[command(name = "kata")]
#[command(about = "Operator tooling for the kata challenge backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the badges earned and progress for an approved-submission count
    Badges(BadgesArgs),
    /// Extract the video id from a YouTube URL
    VideoId(VideoIdArgs),
    /// Show the flag for a country name or ISO code
    Flag(FlagArgs),
    /// Export every submission in a state database as CSV
    Export(ExportArgs),
    /// Hash a moderator password for ADMIN_PASSWORD_HASH
    HashPassword(HashPasswordArgs),
}

#[derive(Parser, Debug)]
struct BadgesArgs {
    count: u32,
}

#[derive(Parser, Debug)]
struct VideoIdArgs {
    url: String,
}

#[derive(Parser, Debug)]
struct FlagArgs {
    country: String,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Path to the SQLite state database
    #[arg(long, default_value = "kata.db")]
    db: PathBuf,

    /// Write to this file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct HashPasswordArgs {
    /// Password to hash (read from the first line of stdin if omitted)
    password: Option<String>,
}

fn run_badges(args: BadgesArgs) -> Result<()> {
    let report = badge_report(args.count);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode badge report")?
    );
    Ok(())
}

fn run_video_id(args: VideoIdArgs) -> Result<()> {
    let id = extract_video_id(&args.url)
        .ok_or_else(|| anyhow!("No video id found in {}", args.url))?;
    println!("{}", id);
    Ok(())
}

fn run_flag(args: FlagArgs) -> Result<()> {
    match country::lookup(&args.country) {
        Some((code, name)) => println!("{} {} ({})", country::flag(code), name, code),
        None => println!("{} (unknown country)", country::flag(&args.country)),
    }
    Ok(())
}

async fn run_export(args: ExportArgs) -> Result<()> {
    if !args.db.exists() {
        return Err(anyhow!("State database not found: {}", args.db.display()));
    }
    let repo = SqliteRepository::new(&args.db)
        .with_context(|| format!("Failed to open {}", args.db.display()))?;
    let submissions = repo
        .all_submissions()
        .await
        .context("Failed to read submissions")?;
    let dojos = repo.list_dojos().await.context("Failed to read dojos")?;
    let csv = submissions_csv(&submissions, &dojos);

    match args.out {
        Some(path) => {
            fs::write(&path, csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} submissions to {}",
                submissions.len(),
                path.display()
            );
        }
        None => print!("{}", csv),
    }
    Ok(())
}

fn run_hash_password(args: HashPasswordArgs) -> Result<()> {
    let password = match args.password {
        Some(p) => p,
        None => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err(anyhow!("Password must not be empty"));
    }
    let hash = hash_password(&password).map_err(|e| anyhow!("{}", e))?;
    println!("{}", hash);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Badges(args) => run_badges(args),
        Commands::VideoId(args) => run_video_id(args),
        Commands::Flag(args) => run_flag(args),
        Commands::Export(args) => run_export(args).await,
        Commands::HashPassword(args) => run_hash_password(args),
    }
}
