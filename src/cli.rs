// Glimpse CLI binary

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use glimpse::config::Config;
use glimpse::constants::{DEFAULT_CONFIG_FILE, DEFAULT_LIST_LIMIT};
use glimpse::db::open_db;
use glimpse::db::schema::{self, ListFilter, MediaKind};
use glimpse::scan::Scanner;

#[derive(Parser)]
#[command(name = "glimpse")]
#[command(about = "Glimpse - photo and video library indexer", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization pass now
    Scan,

    /// List catalog entries, newest first
    List {
        /// Only entries in this folder (and below)
        #[arg(long)]
        folder: Option<String>,
        /// photo or video
        #[arg(long)]
        media_type: Option<String>,
        /// Maximum entries to show
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: i64,
    },

    /// Show one entry
    Show {
        /// Entry ID
        id: i64,
    },

    /// Catalog totals
    Stats,

    /// Folders and their entry counts
    Folders,

    /// Write a config file with every setting at its default
    InitConfig {
        /// Where to write the file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        return cmd_init_config(path);
    }

    let config = Config::load(&cli.config)?;
    glimpse::init_logging(&config.log_level);

    match cli.command {
        Commands::Scan => cmd_scan(&config),
        Commands::List { folder, media_type, limit } => cmd_list(&config, folder, media_type, limit),
        Commands::Show { id } => cmd_show(&config, id),
        Commands::Stats => cmd_stats(&config),
        Commands::Folders => cmd_folders(&config),
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn cmd_init_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    Config::default().save_example(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn cmd_scan(config: &Config) -> Result<()> {
    println!("Scanning {}...", config.originals_path.display());

    let scanner = Scanner::from_config(config);
    let summary = scanner.run_pass()?;

    println!();
    println!("Seen:            {}", summary.seen);
    println!("Indexed:         {}", summary.indexed);
    println!("Unchanged:       {}", summary.unchanged);
    println!("Skipped:         {}", summary.skipped);
    println!("Failed:          {}", summary.failed);
    println!("Orphans removed: {}", summary.orphans_removed);
    if summary.deadline_hit {
        println!("Stopped early: pass deadline reached");
    }
    Ok(())
}

fn cmd_list(config: &Config, folder: Option<String>, media_type: Option<String>, limit: i64) -> Result<()> {
    let media_type = match media_type.as_deref() {
        Some(s) => Some(
            MediaKind::parse(s).ok_or_else(|| anyhow::anyhow!("media type must be photo or video, got '{}'", s))?,
        ),
        None => None,
    };

    let conn = open_db(&config.database_path)?;
    let filter = ListFilter {
        folder,
        media_type,
        limit: Some(limit),
        offset: None,
    };
    let entries = schema::list_entries(&conn, &filter)?;

    if entries.is_empty() {
        println!("No entries found. Use 'glimpse scan' to index the library.");
        return Ok(());
    }

    println!("{:>6}  {:>5}  {:>11}  {:>10}  {:<20}  {}", "ID", "Type", "Size", "Modified", "Folder", "Filename");
    println!("{}", "-".repeat(80));

    for entry in entries {
        let modified = entry.mod_time.split('T').next().unwrap_or(&entry.mod_time).to_string();
        let folder = if entry.folder.is_empty() { "/".to_string() } else { entry.folder.clone() };
        println!(
            "{:>6}  {:>5}  {:>11}  {:>10}  {:<20}  {}",
            entry.id,
            entry.media_type.as_str(),
            format_size(entry.file_size),
            modified,
            truncate(&folder, 20),
            entry.filename
        );
    }

    Ok(())
}

fn cmd_show(config: &Config, id: i64) -> Result<()> {
    let conn = open_db(&config.database_path)?;
    let entry = schema::get_entry(&conn, id)?
        .ok_or_else(|| anyhow::anyhow!("Entry {} not found", id))?;

    println!("Entry #{}", entry.id);
    println!();
    println!("File:        {}", entry.original_path);
    println!("Thumbnail:   {}", entry.thumbnail_path);
    println!("Type:        {}", entry.media_type.as_str());
    println!("Size:        {}", format_size(entry.file_size));
    println!("Modified:    {}", entry.mod_time);

    if entry.width > 0 && entry.height > 0 {
        println!("Resolution:  {}x{}", entry.width, entry.height);
    }
    if entry.duration > 0.0 {
        println!("Duration:    {}", format_duration(entry.duration));
    }
    if entry.framerate > 0.0 {
        println!("FPS:         {:.2}", entry.framerate);
    }
    if !entry.video_codec.is_empty() {
        println!("Video codec: {}", entry.video_codec);
    }
    if !entry.audio_codec.is_empty() {
        println!("Audio codec: {}", entry.audio_codec);
    }

    println!("Indexed:     {}", entry.created_at);
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let conn = open_db(&config.database_path)?;
    let stats = schema::get_stats(&conn)?;

    println!("Photos:  {}", stats.total_photos);
    println!("Videos:  {}", stats.total_videos);
    println!("Folders: {}", stats.total_folders);
    println!("Size:    {} MB", stats.total_original_mb);
    Ok(())
}

fn cmd_folders(config: &Config) -> Result<()> {
    let conn = open_db(&config.database_path)?;
    let folders = schema::list_folders(&conn)?;

    if folders.is_empty() {
        println!("No folders indexed yet.");
        return Ok(());
    }

    for folder in folders {
        let name = if folder.path.is_empty() { "/" } else { folder.path.as_str() };
        println!("{:>7}  {}", folder.photo_count, name);
    }
    Ok(())
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as i64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
