use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod message;
mod models;
mod report;
mod snapshot;
mod status;
mod window;

use crate::config::NudgerConfig;
use crate::models::{EntityId, WeeklyReport};
use crate::snapshot::Snapshot;
use crate::status::DuplicatePolicy;
use crate::window::ReportWindow;

#[derive(Parser)]
#[command(name = "canvas-nudger")]
#[command(about = "Weekly assignment status and student outreach for Canvas courses", long_about = None)]
struct Cli {
    /// Saved defaults (templates, course ids, window)
    #[arg(long, global = true, env = "NUDGER_CONFIG", default_value = "defaults.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunOptions {
    /// Course data exported by the fetcher
    #[arg(long)]
    snapshot: PathBuf,
    /// Start of the due-date window; naive values are UTC
    #[arg(long)]
    start: Option<String>,
    /// End of the due-date window; naive values are UTC
    #[arg(long)]
    end: Option<String>,
    /// Restrict to these course ids (repeatable)
    #[arg(long = "course")]
    courses: Vec<String>,
    /// Which submission wins when a student has several
    #[arg(long, value_enum, default_value_t = DuplicatePolicy::First)]
    duplicates: DuplicatePolicy,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the weekly completion report
    Report {
        #[command(flatten)]
        run: RunOptions,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Generate outreach messages for the report's students
    Messages {
        #[command(flatten)]
        run: RunOptions,
        /// course_id:student_id pairs to message; everyone when omitted
        #[arg(long = "select")]
        selections: Vec<String>,
        #[arg(long, default_value = "messages.csv")]
        out: PathBuf,
        /// Also write the batch as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Render the configured templates with sample data
    Preview,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "canvas_nudger=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = NudgerConfig::load(&cli.config)?;
    let now = Utc::now();

    match cli.command {
        Commands::Report { run, out, json } => {
            let (report, window) = weekly_report(&run, &config, now)?;
            std::fs::write(&out, report::build_report(&report, &window))
                .with_context(|| format!("failed to write {}", out.display()))?;
            if let Some(path) = json {
                write_json(&path, &report)?;
            }
            println!("Report written to {}.", out.display());
        }
        Commands::Messages {
            run,
            selections,
            out,
            json,
        } => {
            let (report, _) = weekly_report(&run, &config, now)?;
            let batch = message::build_outreach(&report, &selections, &config.templates(), now)
                .context("failed to generate messages")?;

            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_outreach_csv(&batch, file)?;
            if let Some(path) = json {
                write_json(&path, &batch)?;
            }
            println!(
                "{} messages written to {}.",
                batch.messages.len(),
                out.display()
            );
        }
        Commands::Preview => {
            let (congrats, encourage) = message::preview_templates(&config.templates())
                .context("message templates are invalid")?;
            println!("--- congrats ---\n{congrats}\n");
            println!("--- encourage ---\n{encourage}");
        }
    }

    Ok(())
}

fn weekly_report(
    run: &RunOptions,
    config: &NudgerConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<(WeeklyReport, ReportWindow)> {
    let start = run.start.as_deref().or(config.start_date.as_deref());
    let end = run.end.as_deref().or(config.end_date.as_deref());
    let window = match (start, end) {
        (Some(start), Some(end)) => ReportWindow::parse(start, end)?,
        (None, None) => ReportWindow::last_week(now),
        _ => bail!("a report window needs both --start and --end"),
    };

    let course_ids: Vec<EntityId> = if run.courses.is_empty() {
        config.course_ids()
    } else {
        run.courses.iter().map(|id| EntityId::from(id.as_str())).collect()
    };

    let snapshot = Snapshot::from_path(&run.snapshot)?;
    let selected = snapshot.select_courses(&course_ids)?;
    info!(
        courses = selected.len(),
        start = %window.start,
        end = %window.end,
        "building weekly report"
    );

    let report = snapshot
        .build_report(&selected, &window, now, run.duplicates)
        .context("failed to build weekly report")?;
    Ok((report, window))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
