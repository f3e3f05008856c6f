//! travel-team 入口：加载配置、组装团队、运行一次对话并打印记录。

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use travel_team::cli::Cli;
use travel_team::config::load_config;
use travel_team::core::Message;
use travel_team::observability;
use travel_team::team::{RunOutcome, TeamBuilder, TeamRun, TranscriptStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    observability::init(cli.log.as_deref());

    match run(cli).await {
        Ok(run) if run.is_complete() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<TeamRun> {
    let mut config = load_config(cli.config.clone()).context("Failed to load config")?;
    if let Some(max) = cli.max_messages {
        config.team.max_messages = max;
    }
    let save_path = cli.save.clone().or_else(|| config.team.transcript_path.clone());

    let team = TeamBuilder::from_config(config)
        .mock(cli.mock)
        .build()
        .context("Failed to build travel team")?;

    let run = match &cli.resume {
        Some(path) => {
            let mut transcript = TranscriptStore::new(path)
                .load_transcript()
                .with_context(|| format!("Failed to load transcript from {}", path.display()))?;
            if cli.has_request() {
                transcript.push(Message::user(cli.request_text()));
            }
            tracing::info!(path = %path.display(), messages = transcript.len(), "resuming saved run");
            team.resume(transcript).await
        }
        None => team.run(Message::user(cli.request_text())).await,
    };
    print_run(&run);

    if let Some(path) = save_path {
        // 保存失败不影响本次结果
        if let Err(e) = TranscriptStore::new(&path).save(&run) {
            tracing::warn!(error = %e, "could not save transcript");
        }
    }
    Ok(run)
}

fn print_run(run: &TeamRun) {
    for msg in run.transcript.messages() {
        println!("--- Message from {} ---", msg.source());
        println!("{}\n", msg.content());
    }

    match &run.outcome {
        RunOutcome::AgentFailed { role, error } => {
            println!("An error occurred while running the {role} agent:");
            println!("{error}");
        }
        outcome => println!("=== Run {} ({}) ===", run.run_id, outcome),
    }
}
