mod commands;
mod input;
mod logging;
mod progress;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use dupe_review_core::{
    AppConfig, CandidateAssessment, ConfidenceBand, ScanSession, SessionPhase, SessionSnapshot,
    SignalCatalog, SimilaritySettings, Verdict,
};
use input::ScanLogEvent;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Cli::parse();

    let _guard = logging::init_logger(&logging::LogSettings::from_env(args.verbose));

    let loaded = match &args.config {
        Some(path) => dupe_review_core::config::load_configuration_from(path),
        None => dupe_review_core::config::load_configuration(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    match args.command {
        Some(Commands::Evaluate {
            input,
            enable,
            disable,
            threshold,
            json,
        }) => {
            if let Err(err) = run_evaluate(&config, &input, &enable, &disable, threshold, json) {
                error!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Some(Commands::Replay { input }) => {
            if let Err(err) = run_replay(&config, &input) {
                error!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Some(Commands::Signals) => {
            if let Err(err) = run_signals(&config) {
                error!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn build_settings(config: &AppConfig) -> anyhow::Result<SimilaritySettings> {
    let catalog = Arc::new(SignalCatalog::from_config(config).context("building signal catalog")?);
    let settings = SimilaritySettings::from_config(catalog, &config.similarity)
        .context("applying similarity settings")?;
    Ok(settings)
}

fn run_evaluate(
    config: &AppConfig,
    input: &Path,
    enable: &[String],
    disable: &[String],
    threshold: Option<f64>,
    json: bool,
) -> anyhow::Result<()> {
    let records = input::read_candidates(input)?;
    let mut settings = build_settings(config)?;
    let changes = settings.subscribe();
    let session = ScanSession::new(Arc::clone(settings.catalog()), settings.handle());

    for phase in [SessionPhase::Indexing, SessionPhase::Hashing, SessionPhase::Grouping] {
        session.advance(phase)?;
    }
    session.record_items_processed(records.len() as u64)?;
    for record in &records {
        let assessment = session
            .submit_candidate(&record.id, &record.measurements)
            .with_context(|| format!("candidate {}", record.id))?;
        if assessment.meets_threshold {
            session.record_duplicate_group_found()?;
        }
    }
    session.advance(SessionPhase::Reviewing)?;

    println!("{}", format!("Settings revision {}", settings.revision()).bold());
    print_candidates(&session.snapshot().candidates);

    for id in enable {
        settings.set_signal_enabled(id, true)?;
    }
    for id in disable {
        settings.set_signal_enabled(id, false)?;
    }
    if let Some(value) = threshold {
        let applied = settings.set_overall_threshold(value)?;
        if applied != value {
            warn!("Overall threshold {} clamped to {}", value, applied);
        }
    }

    let scan_revision = session.snapshot().settings_revision;
    settings.apply_changes();
    for event in changes.try_iter() {
        let reassessed = session.sync_settings();
        info!(
            "Settings revision {} applied, {} candidates re-scored",
            event.revision, reassessed
        );
        println!();
        println!("{}", format!("Settings revision {}", event.revision).bold());
        print_candidates(&session.snapshot().candidates);
    }

    session.advance(SessionPhase::Completed)?;
    let snapshot = session.snapshot();
    for line in flag_summary(scan_revision, &snapshot) {
        info!("{}", line);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(())
}

fn run_replay(config: &AppConfig, input: &Path) -> anyhow::Result<()> {
    let events = input::read_scan_log(input)?;
    let settings = build_settings(config)?;
    let session = ScanSession::new(Arc::clone(settings.catalog()), settings.handle())
        .with_reporter(Arc::new(CliReporter::new()));

    for (step, event) in events.into_iter().enumerate() {
        let applied = match event {
            ScanLogEvent::Advance { phase } => session.advance(phase).map(|_| ()),
            ScanLogEvent::Items { count } => session.record_items_processed(count).map(|_| ()),
            ScanLogEvent::DuplicateGroup => session.record_duplicate_group_found().map(|_| ()),
            ScanLogEvent::Candidate(record) => session
                .submit_candidate(&record.id, &record.measurements)
                .map(|_| ()),
            ScanLogEvent::Fail { reason } => session.fail(reason).map(|_| ()),
            ScanLogEvent::Cancel => session.cancel().map(|_| ()),
        };
        if let Err(err) = applied {
            warn!("Scan log step {} rejected: {}", step + 1, err);
        }
    }

    let snapshot = session.snapshot();
    println!();
    info!(
        "Run {} ended in {} ({:.0}%)",
        snapshot.run,
        format!("{}", snapshot.phase).cyan(),
        snapshot.progress * 100.0,
    );
    info!(
        "{} items processed, {} duplicate groups",
        format!("{}", snapshot.metrics.items_processed).green(),
        format!("{}", snapshot.metrics.duplicates_flagged).red(),
    );
    if let Some(reason) = &snapshot.failure {
        info!("Failure: {}", format!("{}", reason).red());
    }
    print_candidates(&snapshot.candidates);

    Ok(())
}

fn run_signals(config: &AppConfig) -> anyhow::Result<()> {
    let settings = build_settings(config)?;
    let working = settings.working();
    for def in settings.catalog().iter() {
        let mark = if working.is_enabled(&def.id) {
            "on ".green()
        } else {
            "off".dimmed()
        };
        println!(
            "  {} {:<12} {:<28} weight {:.2}  threshold {}",
            mark,
            def.id,
            def.display_name,
            working.weight_for(def).get(),
            def.default_threshold,
        );
    }
    println!(
        "  overall threshold {:.2}",
        working.overall_threshold
    );
    Ok(())
}

/// Duplicate groups are counted while scanning; flags reflect the settings
/// the candidates were last scored under. Each line names its revision.
fn flag_summary(scan_revision: u64, snapshot: &SessionSnapshot) -> Vec<String> {
    vec![
        format!(
            "{} duplicate groups counted during scan (settings revision {})",
            snapshot.metrics.duplicates_flagged, scan_revision
        ),
        format!(
            "{} of {} candidates flagged (settings revision {})",
            snapshot.flagged().count(),
            snapshot.candidates.len(),
            snapshot.settings_revision
        ),
    ]
}

fn print_candidates(candidates: &[CandidateAssessment]) {
    for candidate in candidates {
        let confidence = format!("{:.3}", candidate.confidence);
        let confidence = match candidate.band {
            ConfidenceBand::Strong => confidence.green(),
            ConfidenceBand::Moderate => confidence.yellow(),
            ConfidenceBand::Weak => confidence.red(),
        };
        let flag = if candidate.meets_threshold { "dup" } else { "   " };
        let evidence: Vec<String> = candidate
            .evidence
            .iter()
            .map(|item| {
                let verdict = match item.verdict() {
                    Verdict::Pass => item.verdict().to_string().green(),
                    Verdict::Warn => item.verdict().to_string().yellow(),
                    Verdict::Fail => item.verdict().to_string().red(),
                };
                format!("{}={}", item.id(), verdict)
            })
            .collect();
        println!(
            "  {} {} {:<24} {}",
            flag.bold(),
            confidence,
            candidate.candidate_id,
            evidence.join(" ")
        );
    }
}
