use anyhow::{bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::watch;

use crate::chat::ChatSession;
use crate::job::{JobState, JobStatus};
use crate::questionnaire::prompts::YEAR_RANGE;
use crate::questionnaire::{Answer, AnswerRecord, FlowController, FlowStep, InputKind};

/// Line-oriented prompting over any async reader/writer pair.
pub struct Terminal<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn say(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Prints `prompt` and reads one line. `None` at end of input.
    pub async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        self.out.write_all(prompt.as_bytes()).await?;
        self.out.flush().await?;
        Ok(self.lines.next_line().await?)
    }

    pub async fn confirm(&mut self, question: &str) -> Result<bool> {
        let line = self.ask(&format!("{question} [y/N] ")).await?;
        Ok(matches!(
            line.as_deref().map(|l| l.trim().to_ascii_lowercase()).as_deref(),
            Some("y") | Some("yes")
        ))
    }

    /// Walks the user through every prompt until the flow completes.
    pub async fn run_questionnaire(&mut self, mut flow: FlowController) -> Result<AnswerRecord> {
        let mut number = 1;
        while let Some(prompt) = flow.current_prompt() {
            let kind = prompt.input_kind();
            let hint = match kind {
                InputKind::FreeText => String::new(),
                InputKind::YesNo => "[yes/no] ".to_string(),
                InputKind::Year => format!("[{}-{}] ", YEAR_RANGE.start(), YEAR_RANGE.end()),
            };
            let Some(line) = self
                .ask(&format!("Question {number}: {}{hint}", prompt.text()))
                .await?
            else {
                bail!("Input closed before the questionnaire was completed");
            };

            match flow.advance(Answer::from_line(kind, &line)) {
                Ok(FlowStep::Submit(_)) | Ok(FlowStep::Completed) => break,
                Ok(FlowStep::Ask(_)) => number += 1,
                Err(e) => self.say(&format!("Required Field: {e}")).await?,
            }
        }
        self.say("All information collected.").await?;
        Ok(flow.into_record())
    }

    /// Prints job state changes until the job leaves `finetuning`.
    pub async fn follow(&mut self, rx: &mut watch::Receiver<JobState>) -> Result<JobState> {
        let mut last: Option<(JobStatus, u8)> = None;
        loop {
            let state = rx.borrow_and_update().clone();
            if last != Some((state.status, state.progress)) {
                self.say(&render(&state)).await?;
                last = Some((state.status, state.progress));
            }
            if state.status != JobStatus::Finetuning {
                return Ok(state);
            }
            if rx.changed().await.is_err() {
                return Ok(rx.borrow().clone());
            }
        }
    }

    /// Chat loop. `/quit` or end of input leaves.
    pub async fn run_chat(&mut self, session: &mut ChatSession) -> Result<()> {
        if let Some(greeting) = session.messages().first() {
            let text = format!("assistant> {}", greeting.text);
            self.say(&text).await?;
        }
        loop {
            let Some(line) = self.ask("you> ").await? else {
                return Ok(());
            };
            if line.trim() == "/quit" {
                return Ok(());
            }
            if let Some(reply) = session.send(&line).await {
                let text = format!("assistant> {}", reply.text);
                self.say(&text).await?;
            }
        }
    }
}

/// One status line, e.g. `[finetuning] Fine-tuning model: 42%`.
pub fn render(state: &JobState) -> String {
    match state.status {
        JobStatus::Finetuning => format!(
            "[{}] {}: {}%",
            state.status,
            state.status.label(),
            state.progress
        ),
        JobStatus::Error => format!(
            "[{}] {}",
            state.status,
            state.error.as_deref().unwrap_or("Unknown error occurred")
        ),
        _ => format!("[{}] {}", state.status, state.status.label()),
    }
}
