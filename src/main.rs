//! Simtrans - Translation submission and completeness reports
//!
//! Command line entry point: loads configuration, sets up logging and runs
//! one operation of the translation workflow.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use simtrans::cli::{Args, Commands};
use simtrans::config::Config;
use simtrans::form::transport::TransportForm;
use simtrans::form::TranslationFormData;
use simtrans::report::{ReportEvent, ReportMode, ReportObject};
use simtrans::translation::TranslationSubmission;
use simtrans::workflow::TranslationWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("simtrans.toml").exists() {
                info!("Found simtrans.toml in current directory, loading...");
                Config::from_file("simtrans.toml")?
            } else {
                Config::default()
            }
        }
    };

    let workflow = TranslationWorkflow::from_config(&config)?;

    match args.command {
        Commands::Sims => {
            let sims = workflow.simulations().await?;
            println!("{:<35} {:<8} {:<40}", "Name", "Visible", "Translated languages");
            println!("{}", "-".repeat(83));
            for sim in sims {
                println!(
                    "{:<35} {:<8} {:<40}",
                    sim.name,
                    if sim.visible { "yes" } else { "no" },
                    sim.translated_languages.join(",")
                );
            }
        }
        Commands::Form { sim, lang, user, transport } => {
            let form = workflow.get_translation_form_data(&sim, &lang, user).await?;
            let json = if transport {
                serde_json::to_string_pretty(&TransportForm::from(&form))?
            } else {
                serde_json::to_string_pretty(&form)?
            };
            println!("{}", json);
        }
        Commands::SaveDraft { file, user } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read form data {}", file.display()))?;
            let form: TranslationFormData = serde_json::from_str(&content)?;
            workflow.save_draft(user, &form).await?;
        }
        Commands::Submit { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read submission {}", file.display()))?;
            let submission: TranslationSubmission = serde_json::from_str(&content)?;
            let report = workflow.submit_translation(&submission).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.all_succeeded() {
                anyhow::bail!("submission failed for {:?}", report.failed_repos());
            }
        }
        Commands::Report { sim, lang, untranslated } => {
            let report = workflow.get_report(&sim, &lang, report_mode(untranslated)).await?;
            print_report_header();
            print_report_line(&report);
        }
        Commands::LanguageReport { lang, untranslated } => {
            let mut events = workflow
                .stream_language_report(&lang, report_mode(untranslated))
                .await?;

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} simulations {msg}")
                    .context("Invalid progress template")?,
            );
            print_report_header();

            while let Some(event) = events.recv().await {
                match event {
                    ReportEvent::Report { report } => {
                        pb.inc(1);
                        pb.suspend(|| print_report_line(&report));
                    }
                    ReportEvent::Failed { simulation_name, error } => {
                        pb.inc(1);
                        pb.suspend(|| println!("{:<35} failed: {}", simulation_name, error));
                    }
                    ReportEvent::Complete { simulations } => {
                        pb.finish_with_message(format!("done ({} total)", simulations));
                    }
                }
            }
        }
        Commands::Flush { sim, lang } => {
            let flushed = workflow.flush_report(&lang, &sim);
            println!("{}", if flushed { "flushed" } else { "not cached" });
        }
    }

    Ok(())
}

fn report_mode(untranslated: bool) -> ReportMode {
    if untranslated {
        ReportMode::Untranslated
    } else {
        ReportMode::Translated
    }
}

fn print_report_header() {
    println!(
        "{:<35} {:>12} {:>12} {:>12} {:>8}",
        "Simulation", "Sim-specific", "Shared", "Common", "Total"
    );
    println!("{}", "-".repeat(83));
}

fn print_report_line(report: &ReportObject) {
    let cell = |translated: usize, total: usize, percent: u32| {
        format!("{}/{} {}%", translated, total, percent)
    };
    println!(
        "{:<35} {:>12} {:>12} {:>12} {:>7}%{}",
        report.simulation_name,
        cell(report.sim_specific.translated, report.sim_specific.total, report.sim_specific.percent),
        cell(report.shared.translated, report.shared.total, report.shared.percent),
        cell(report.common.translated, report.common.total, report.common.percent),
        report.percent_total,
        if report.is_dirty { " (stale)" } else { "" }
    );
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".simtrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "simtrans.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("simtrans.log").display()
    );

    Ok(())
}
