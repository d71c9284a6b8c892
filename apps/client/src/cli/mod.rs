// Command-line surface. Parses arguments with clap and routes each
// subcommand to a handler; the handlers only talk to the user and delegate
// the actual work to the questionnaire, job and chat modules.

pub mod commands;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::info;

use crate::backend::ProgressQuery;
use crate::chat::ChatSession;
use crate::config::Config;
use crate::job::{JobStatus, JobTracker};
use crate::questionnaire::{AnswerRecord, FlowController};
use crate::state::AppState;
use crate::terminal::{render, Terminal};
use commands::{Commands, DownloadArgs, RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "stellaris",
    version,
    about = "Build a personal dataset from a career questionnaire, fine-tune a model on it, then chat with it."
)]
pub struct Cli {
    /// Backend base URL (overrides STELLARIS_API_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<()> {
        let mut term = Terminal::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());

        // The questionnaire alone never touches the backend.
        if let Commands::Questionnaire(args) = &self.command {
            return questionnaire(&mut term, &args.out).await;
        }

        let app = AppState::connect(config, self.base_url.as_deref())?;
        dispatch(&app, &mut term, self.command).await
    }
}

pub(crate) async fn dispatch<R, W>(
    app: &AppState,
    term: &mut Terminal<R, W>,
    command: Commands,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match command {
        Commands::Run(args) => run_pipeline(app, term, args).await,
        Commands::Questionnaire(args) => questionnaire(term, &args.out).await,
        Commands::Submit(args) => submit(app, term, &args.record).await,
        Commands::Train => train(app, term).await,
        Commands::Status => status(app, term).await,
        Commands::Chat => chat(app, term).await,
        Commands::Download(args) => download(app, term, args).await,
        Commands::Ping => ping(app, term).await,
    }
}

async fn run_pipeline<R, W>(app: &AppState, term: &mut Terminal<R, W>, args: RunArgs) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let record = match &args.record {
        Some(path) => load_record(path).await?,
        None => term.run_questionnaire(FlowController::new()).await?,
    };
    if let Some(path) = &args.save_record {
        save_record(path, &record).await?;
        term.say(&format!("Answers saved to {}", path.display())).await?;
    }

    let mut tracker = JobTracker::new(app.backend.clone(), record, app.poll_settings());
    let mut rx = tracker.subscribe();
    term.say(&render(&tracker.state())).await?;
    tracker.submit_dataset().await;

    // Set when `follow` has already printed the error line.
    let mut shown = false;
    loop {
        match tracker.status() {
            // `submit_dataset` always settles on success or error.
            JobStatus::DatasetCreation => bail!("Dataset creation did not finish"),
            JobStatus::DatasetSuccess => {
                term.say(&render(&tracker.state())).await?;
                if !args.yes && !term.confirm("Start fine-tuning the model?").await? {
                    term.say("Dataset is ready. Run `stellaris train` to fine-tune it later.")
                        .await?;
                    return Ok(());
                }
                tracker.start_training().await?;
            }
            JobStatus::Finetuning => {
                let end = term.follow(&mut rx).await?;
                shown = end.status == JobStatus::Error;
            }
            JobStatus::FinetuningSuccess => break,
            JobStatus::Error => {
                if !std::mem::take(&mut shown) {
                    term.say(&render(&tracker.state())).await?;
                }
                if !recover(&mut tracker, term).await? {
                    let state = tracker.state();
                    bail!(state.error.unwrap_or_else(|| "Unknown error occurred".to_string()));
                }
            }
        }
    }

    term.say("Your model is ready.").await?;
    if args.chat {
        chat(app, term).await?;
    } else {
        term.say("Run `stellaris chat` to talk to it.").await?;
    }
    Ok(())
}

/// Error menu. Returns false when the user gives up.
async fn recover<R, W>(tracker: &mut JobTracker, term: &mut Terminal<R, W>) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(choice) = term.ask("[r]etry, [c]heck status or [q]uit? ").await? else {
            return Ok(false);
        };
        match choice.trim().to_ascii_lowercase().as_str() {
            "r" | "retry" => {
                tracker.retry().await?;
                return Ok(true);
            }
            "c" | "check" => match tracker.force_check().await {
                Ok(JobStatus::Error) => term.say(&render(&tracker.state())).await?,
                Ok(_) => return Ok(true),
                Err(e) => term.say(&format!("Error checking progress: {e}")).await?,
            },
            "q" | "quit" => return Ok(false),
            _ => term.say("Please answer r, c or q.").await?,
        }
    }
}

async fn questionnaire<R, W>(term: &mut Terminal<R, W>, out: &Path) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let record = term.run_questionnaire(FlowController::new()).await?;
    save_record(out, &record).await?;
    term.say(&format!("{} answers saved to {}", record.len(), out.display()))
        .await
}

async fn submit<R, W>(app: &AppState, term: &mut Terminal<R, W>, path: &Path) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let record = load_record(path).await?;
    let mut tracker = JobTracker::new(app.backend.clone(), record, app.poll_settings());
    let status = tracker.submit_dataset().await;
    term.say(&render(&tracker.state())).await?;
    if status == JobStatus::Error {
        bail!("Dataset generation failed");
    }
    Ok(())
}

async fn train<R, W>(app: &AppState, term: &mut Terminal<R, W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tracker = JobTracker::for_existing_dataset(app.backend.clone(), app.poll_settings());
    let mut rx = tracker.subscribe();
    tracker.start_training().await?;

    let end = term.follow(&mut rx).await?;
    if end.status == JobStatus::Error {
        bail!("Fine-tuning failed");
    }
    Ok(())
}

async fn status<R, W>(app: &AppState, term: &mut Terminal<R, W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let report = app
        .backend
        .progress(ProgressQuery::Manual)
        .await
        .context("Error checking progress")?;
    term.say(&format!(
        "Status: {}, Progress: {}%",
        report.status().as_str(),
        report.percent()
    ))
    .await?;
    if let Some(message) = report.message.as_deref() {
        term.say(message).await?;
    }
    Ok(())
}

async fn chat<R, W>(app: &AppState, term: &mut Terminal<R, W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = ChatSession::new(app.backend.clone());
    term.run_chat(&mut session).await
}

async fn download<R, W>(app: &AppState, term: &mut Terminal<R, W>, args: DownloadArgs) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bytes = app
        .backend
        .download(args.artifact)
        .await
        .with_context(|| format!("Failed to download {:?}", args.artifact))?;
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(args.artifact.default_file_name()));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Downloaded {} bytes to {}", bytes.len(), path.display());
    term.say(&format!("Saved {}", path.display())).await
}

async fn ping<R, W>(app: &AppState, term: &mut Terminal<R, W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let reply = app
        .backend
        .ping()
        .await
        .context("Cannot connect to backend server")?;
    term.say(&format!("Backend reachable: {reply}")).await
}

async fn load_record(path: &Path) -> Result<AnswerRecord> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record: AnswerRecord = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid answer record", path.display()))?;
    if record.is_empty() {
        bail!("{} has no answers", path.display());
    }
    Ok(record)
}

async fn save_record(path: &Path, record: &AnswerRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
