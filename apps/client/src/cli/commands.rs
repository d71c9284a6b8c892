use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::backend::Artifact;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Questionnaire, dataset generation, fine-tuning and (optionally) chat in one go
    Run(RunArgs),

    /// Answer the questionnaire and save the record as JSON
    Questionnaire(QuestionnaireArgs),

    /// Submit a saved record for dataset generation
    Submit(SubmitArgs),

    /// Start fine-tuning on an already generated dataset and follow progress
    Train,

    /// Check training progress once
    Status,

    /// Chat with the fine-tuned model (`/quit` to leave)
    Chat,

    /// Download the generated dataset or the trained adapter
    Download(DownloadArgs),

    /// Check that the backend is reachable
    Ping,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Use answers from a saved record instead of asking
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Also write the collected answers to this file
    #[arg(long)]
    pub save_record: Option<PathBuf>,

    /// Start fine-tuning without asking for confirmation
    #[arg(long, short)]
    pub yes: bool,

    /// Open a chat session once the model is ready
    #[arg(long)]
    pub chat: bool,
}

#[derive(Args, Debug)]
pub struct QuestionnaireArgs {
    /// Where to write the answer record
    #[arg(long, short, default_value = "answers.json")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Answer record written by `questionnaire`
    pub record: PathBuf,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[arg(value_enum)]
    pub artifact: Artifact,

    /// Output path; defaults to `dataset.json` or `lora_model.zip`
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}
