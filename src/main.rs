use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;

use scan_review::commands;
use scan_review::models::response::{CommandResponse, HealthResponse};
use scan_review::models::settings::{AppConfig, SettingsUpdate};
use scan_review::services::analysis::AnalysisProgress;
use scan_review::{AppResult, AppState};
use scan_review_core::{CaseRecord, PatientTranslation};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("scan-review error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let state = AppState::new();
    state
        .initialize()
        .await
        .context("failed to initialize scan-review")?;

    dispatch(cli.command, &state, cli.json).await
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

async fn dispatch(command: Commands, state: &AppState, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Start => emit(json, commands::start_case(state).await, print_case),
        Commands::Intake {
            patient_ref,
            context,
        } => emit(
            json,
            commands::update_intake(state, patient_ref, context).await,
            print_case,
        ),
        Commands::Analyze { files, context } => {
            let (tx, rx) = mpsc::channel(16);
            let printer = if json {
                drop(rx);
                None
            } else {
                Some(tokio::spawn(print_progress(rx)))
            };
            let result = commands::analyze_files(state, files, context, Some(tx)).await;
            if let Some(printer) = printer {
                let _ = printer.await;
            }
            emit(json, result, print_case)
        }
        Commands::Show => {
            let case = commands::get_case(state).await;
            let actions = commands::available_actions(state).await?;
            emit(json, case, |case| match case {
                Some(case) => {
                    print_case(case);
                    let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
                    println!("Available: {}", names.join(", "));
                }
                None => println!("No active case. Run `scan-review start`."),
            })
        }
        Commands::Accept { finding_id } => emit(
            json,
            commands::accept_finding(state, &finding_id).await,
            print_case,
        ),
        Commands::Reject { finding_id } => emit(
            json,
            commands::reject_finding(state, &finding_id).await,
            print_case,
        ),
        Commands::Persona { persona } => emit(
            json,
            commands::set_persona(state, persona).await,
            |persona| println!("Acting as {}", persona),
        ),
        Commands::RequestReview { reviewer, note } => emit(
            json,
            commands::submit_for_review(state, reviewer, &note).await,
            print_case,
        ),
        Commands::Review { notes, draft } => {
            let result = if draft {
                commands::update_reviewer_notes(state, &notes).await
            } else {
                commands::submit_review(state, &notes).await
            };
            emit(json, result, print_case)
        }
        Commands::Finalize => emit(json, commands::finalize(state).await, print_case),
        Commands::Translate => emit(
            json,
            commands::translate_for_patient(state).await,
            print_translation,
        ),
        Commands::Report { set, patient } => {
            let result = match set {
                Some(text) => match commands::update_report(state, &text).await {
                    Ok(case) => Ok(case.final_report_text),
                    Err(e) => Err(e),
                },
                None if patient => commands::get_patient_view(state).await,
                None => commands::get_report(state).await,
            };
            emit(json, result, |text| println!("{}", text))
        }
        Commands::Reset => emit(json, commands::reset_analysis(state).await, print_case),
        Commands::SetKey {
            provider,
            key,
            delete,
        } => {
            let result = match key {
                Some(key) if !delete => commands::set_api_key(state, provider, &key).await,
                _ => commands::delete_api_key(state, provider).await,
            };
            emit(json, result, |_| {
                if delete {
                    println!("Removed API key for {}", provider);
                } else {
                    println!("Stored API key for {}", provider);
                }
            })
        }
        Commands::Config {
            provider,
            model,
            base_url,
            batch_size,
            timeout,
            exam_title,
            reviewer,
            require_peer_review,
            reset,
        } => {
            let update = SettingsUpdate {
                provider,
                model,
                base_url,
                batch_size,
                request_timeout_secs: timeout,
                exam_title,
                default_reviewer: reviewer,
                require_peer_review,
                ..Default::default()
            };
            let result = if reset {
                commands::reset_settings(state).await
            } else if is_empty_update(&update) {
                commands::get_settings(state).await
            } else {
                commands::update_settings(state, update).await
            };
            emit(json, result, print_config)
        }
        Commands::Health => emit(json, Ok(commands::get_health(state).await), print_health),
    }
}

/// Print a command result, either as a JSON command response or as text.
fn emit<T: Serialize>(
    json: bool,
    result: AppResult<T>,
    render: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if json {
        let response = CommandResponse::from(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
        match response.error {
            Some(error) => anyhow::bail!(error),
            None => Ok(()),
        }
    } else {
        render(&result?);
        Ok(())
    }
}

fn is_empty_update(update: &SettingsUpdate) -> bool {
    update.provider.is_none()
        && update.model.is_none()
        && update.base_url.is_none()
        && update.batch_size.is_none()
        && update.request_timeout_secs.is_none()
        && update.exam_title.is_none()
        && update.default_reviewer.is_none()
        && update.require_peer_review.is_none()
}

async fn print_progress(mut rx: mpsc::Receiver<AnalysisProgress>) {
    while let Some(progress) = rx.recv().await {
        eprintln!(
            "[{:>3}%] {}/{} images",
            progress.percent, progress.processed, progress.total
        );
    }
}

fn print_case(case: &CaseRecord) {
    println!("Case {} [{}]", case.id, case.status);
    println!("Patient ref: {}", case.patient_ref);
    if !case.clinical_context.is_empty() {
        println!("Clinical context: {}", case.clinical_context);
    }
    if let Some(reviewer) = &case.assigned_reviewer {
        println!("Reviewer: {}", reviewer);
    }
    if let Some(metadata) = &case.analysis_metadata {
        let validity = if metadata.is_valid_modality {
            "valid"
        } else {
            "not valid"
        };
        println!("Modality: {} ({})", validity, metadata.modality_description);
    }
    if !case.findings.is_empty() {
        println!("Findings:");
        for finding in &case.findings {
            println!(
                "  {} [{:?}] {}: {} ({})",
                finding.id, finding.review_status, finding.region, finding.title, finding.likelihood
            );
            println!("      {}", finding.description);
        }
    }
    if let Some(note) = &case.reviewer_note {
        println!("Reviewer notes: {}", note);
    }
}

fn print_translation(translation: &PatientTranslation) {
    println!("{}", translation.summary);
    if !translation.questions.is_empty() {
        println!("\nQuestions for your doctor:");
        for question in &translation.questions {
            println!("  - {}", question);
        }
    }
    if !translation.resources.is_empty() {
        println!("\nResources:");
        for resource in &translation.resources {
            println!("  - {} ({})", resource.title, resource.source);
        }
    }
}

fn print_config(config: &AppConfig) {
    println!("provider:            {}", config.provider);
    println!("model:               {}", config.resolved_model());
    if let Some(base_url) = &config.base_url {
        println!("base_url:            {}", base_url);
    }
    println!("batch_size:          {}", config.batch_size);
    println!("request_timeout:     {}s", config.request_timeout_secs);
    println!("exam_title:          {}", config.exam_title);
    if let Some(reviewer) = &config.default_reviewer {
        println!("default_reviewer:    {}", reviewer);
    }
    println!("require_peer_review: {}", config.require_peer_review);
}

fn print_health(health: &HealthResponse) {
    println!("{} {} ({})", health.service, health.version, health.status);
    println!("  database:   {}", health.database);
    println!("  config:     {}", health.config);
    println!("  credential: {}", health.credential);
}
