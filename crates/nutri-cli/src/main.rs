mod server;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Timelike;
use clap::{Parser, Subcommand};
use nutri_core::curve::minute_at;
use nutri_core::{
    Advisory, Category, CookMethod, CurveSummary, HabitEdit, RecognitionResult,
    SequenceQuality, synthesize,
};
use nutri_store::DeviceStore;
use rmcp::{ServiceExt, transport::stdio};

#[derive(Parser)]
#[command(name = "nutri", about = "Meal scoring and eating-order advisor CLI and MCP server")]
struct Cli {
    /// Override the device identity
    #[arg(long, global = true)]
    device: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Analyze a recognition result JSON file and log the meal
    Analyze {
        /// Recognition payload file
        path: PathBuf,

        /// Hour of day the meal is eaten (0-23), defaults to the current local hour
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=23))]
        hour: Option<u32>,

        /// Analyze only, do not append to the meal log
        #[arg(long)]
        no_save: bool,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a correction of a recognized ingredient
    Edit {
        /// Name as the recognizer reported it
        original: String,

        /// Corrected name
        #[arg(long)]
        name: Option<String>,

        /// Corrected portion in grams
        #[arg(long)]
        grams: Option<f64>,

        /// Cooking method (steam, stir-fry, deep-fry, braise)
        #[arg(long)]
        cook: Option<String>,
    },

    /// List learned correction habits
    Habits,

    /// Print the projected 4-hour energy curve
    Curve {
        /// Sequence quality (optimal, moderate, poor)
        quality: String,

        /// Dominant category (fiberLead, proteinLead, carbLead)
        #[arg(long)]
        dominant: Option<String>,
    },

    /// Show the cumulative health score
    Health,

    /// Export this device's habits and meals to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import habits and meals from a JSON file into this device
    Import {
        /// Input file path
        path: PathBuf,
    },
}

fn open_store(cli: &Cli) -> Result<DeviceStore> {
    let base_dir = std::env::var("NUTRI_DATA_DIR").ok().map(PathBuf::from);
    DeviceStore::open(cli.device.as_deref(), base_dir.as_deref())
        .context("failed to open device store")
}

/// Hour of the user's wall clock, honoring `TZ`.
pub(crate) fn local_hour() -> u32 {
    chrono::Local::now().hour()
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Analyze {
            path,
            hour,
            no_save,
            json,
        } => cmd_analyze(&cli, path, *hour, !*no_save, *json),
        Commands::Edit {
            original,
            name,
            grams,
            cook,
        } => cmd_edit(&cli, original, name.as_deref(), *grams, cook.as_deref()),
        Commands::Habits => cmd_habits(&cli),
        Commands::Curve { quality, dominant } => cmd_curve(quality, dominant.as_deref()),
        Commands::Health => cmd_health(&cli),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    tracing::info!("starting MCP server for device '{}'", store.device_id());

    let service = server::NutriServer::new(store)
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}

fn format_advisory(advisory: &Advisory) -> String {
    let mut out = advisory.key.as_str().to_string();
    let p = &advisory.params;
    if let Some(t) = &p.crash_time {
        out.push_str(&format!(" crashTime={t}"));
    }
    if let Some(loss) = p.percent_loss {
        out.push_str(&format!(" percentLoss={loss}"));
    }
    if let Some(minutes) = p.minutes_gained {
        out.push_str(&format!(" minutesGained={minutes}"));
    }
    out
}

fn cmd_analyze(cli: &Cli, path: &Path, hour: Option<u32>, save: bool, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let recognition = RecognitionResult::parse(&content)
        .with_context(|| format!("invalid recognition JSON in {}", path.display()))?;

    let store = open_store(cli)?;
    let hour = hour.unwrap_or_else(local_hour);
    let outcome = store
        .log_meal(&recognition, hour, save)
        .context("failed to analyze meal")?;

    if json {
        let out = serde_json::to_string_pretty(&outcome).context("failed to serialize analysis")?;
        println!("{out}");
        return Ok(());
    }

    let a = &outcome.analysis;
    let s = &a.scores;
    println!("food:        {}", outcome.record.food);
    for item in &a.items {
        println!("  {:<12} {:>6.0}g  {}", item.name, item.grams, item.category.as_str());
    }
    println!("quality:     {}", a.quality.as_str());
    println!("order:       {}", a.recommended_order.join(" → "));
    println!(
        "performance: {} ({})",
        s.performance_index,
        s.performance_state.as_str()
    );
    println!("battery:     {} ({})", s.battery_level, s.battery_state.as_str());
    println!("match:       {} ({})", s.match_score, s.match_state.as_str());
    if let Some(c) = &a.curve_summary {
        println!(
            "curve:       peak {:.0} at {} min, final {:.0}",
            c.peak, c.peak_minute, c.final_value
        );
    }
    for advisory in &a.advisories {
        println!("advice:      {}", format_advisory(advisory));
    }
    if !outcome.applied.is_empty() {
        println!(
            "habits:      applied {}{}",
            outcome.applied.join(", "),
            if outcome.trusted { " (trusted)" } else { "" }
        );
    }
    if outcome.saved {
        println!("saved:       {}", outcome.record.id);
    }
    Ok(())
}

fn cmd_edit(
    cli: &Cli,
    original: &str,
    name: Option<&str>,
    grams: Option<f64>,
    cook: Option<&str>,
) -> Result<()> {
    let mut edit = HabitEdit::new(original);
    if let Some(name) = name {
        edit = edit.rename(name);
    }
    if let Some(grams) = grams {
        if !grams.is_finite() || grams < 0.0 {
            bail!("grams must be a non-negative number, got {grams}");
        }
        edit = edit.grams(grams);
    }
    if let Some(cook) = cook {
        let method = CookMethod::parse(cook).with_context(|| format!("unknown cook method '{cook}'"))?;
        edit = edit.cook(method);
    }

    let store = open_store(cli)?;
    let pattern = store.record_edit(&edit).context("failed to record edit")?;
    println!(
        "{}: seen {} time(s){}",
        pattern.original_name,
        pattern.occurrence_count,
        if pattern.auto_apply { ", auto-apply on" } else { "" }
    );
    Ok(())
}

fn cmd_habits(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let patterns = store.patterns().context("failed to load habits")?;

    println!("device:  {}", store.device_id());
    if patterns.is_empty() {
        println!("(no habits learned)");
        return Ok(());
    }
    for p in &patterns {
        let mut changes = Vec::new();
        if let Some(name) = &p.corrected_name {
            changes.push(format!("→ {name}"));
        }
        if let Some(grams) = p.corrected_grams {
            changes.push(format!("{grams:.0}g"));
        }
        if let Some(method) = p.preferred_cook_method {
            changes.push(method.as_str().to_string());
        }
        println!(
            "{} {} [{}] x{}",
            if p.auto_apply { "*" } else { " " },
            p.original_name,
            changes.join(", "),
            p.occurrence_count
        );
    }
    Ok(())
}

fn cmd_curve(quality: &str, dominant: Option<&str>) -> Result<()> {
    let quality = SequenceQuality::parse(quality)
        .with_context(|| format!("unknown quality '{quality}' (optimal, moderate, poor)"))?;
    let dominant = dominant
        .map(|d| {
            Category::parse(d)
                .with_context(|| format!("unknown category '{d}' (fiberLead, proteinLead, carbLead)"))
        })
        .transpose()?;

    let points = synthesize(quality, dominant);
    for (i, v) in points.iter().enumerate() {
        println!("{:>3} min  {:>5.1}", minute_at(i), v);
    }
    if let Some(s) = CurveSummary::of(&points) {
        println!(
            "peak {:.1} at {} min, trough {:.1}, final {:.1}, mean {:.1}",
            s.peak, s.peak_minute, s.trough, s.final_value, s.mean
        );
    }
    Ok(())
}

fn cmd_health(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let health = store.health().context("failed to load meal log")?;

    println!("device:  {}", store.device_id());
    println!("meals:   {}", health.total_meals);
    println!("days:    {}", health.unique_days);
    println!("score:   {}", health.score);
    println!("level:   {}", health.level.as_str());
    println!("state:   {}", health.state.as_str());
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    store
        .store()
        .export_json_file(path, store.device_id())
        .with_context(|| format!("failed to export to {}", path.display()))?;

    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    let summary = store
        .store()
        .import_json_file(path, store.device_id())
        .context("failed to import JSON")?;

    println!(
        "imported from {}. patterns={}, meals={}",
        path.display(),
        summary.patterns,
        summary.meals
    );
    Ok(())
}
