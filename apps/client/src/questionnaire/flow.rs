use std::collections::VecDeque;

use tracing::debug;

use crate::questionnaire::prompts::{
    expand, parse_count, Expansion, Prompt, MAX_EXPANDED_ENTRIES, STATIC_PROMPTS,
};
use crate::questionnaire::record::AnswerRecord;
use crate::questionnaire::validation::{normalize, Answer, ValidationError};

/// Position in the question sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowCursor {
    /// Asking the static prompt at this index.
    Static(usize),
    /// Working through generated sub-prompts. `origin` is the static index
    /// of the count prompt that produced the queue.
    Draining {
        origin: usize,
        queue: VecDeque<Prompt>,
    },
    Complete,
}

/// Result of a successful `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    /// Ask this next.
    Ask(Prompt),
    /// The last answer was recorded; no prompts remain.
    Completed,
    /// The flow was already complete: hand the record to submission.
    Submit(AnswerRecord),
}

/// Walks the static prompt list, expanding count answers into sub-prompts,
/// and accumulates one answer per prompt shown.
#[derive(Debug, Clone)]
pub struct FlowController {
    prompts: &'static [&'static str],
    cursor: FlowCursor,
    record: AnswerRecord,
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowController {
    pub fn new() -> Self {
        Self::with_prompts(STATIC_PROMPTS)
    }

    /// A controller over a custom static list. Prompts are matched to
    /// expansions and input kinds by text, so the special prompts work
    /// wherever they sit in the list.
    pub fn with_prompts(prompts: &'static [&'static str]) -> Self {
        let cursor = if prompts.is_empty() {
            FlowCursor::Complete
        } else {
            FlowCursor::Static(0)
        };
        Self {
            prompts,
            cursor,
            record: AnswerRecord::new(),
        }
    }

    #[cfg(test)]
    pub fn cursor(&self) -> &FlowCursor {
        &self.cursor
    }

    #[cfg(test)]
    pub fn record(&self) -> &AnswerRecord {
        &self.record
    }

    pub fn into_record(self) -> AnswerRecord {
        self.record
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.cursor == FlowCursor::Complete
    }

    pub fn current_prompt(&self) -> Option<Prompt> {
        match &self.cursor {
            FlowCursor::Static(i) => Some(self.static_prompt(*i)),
            FlowCursor::Draining { queue, .. } => queue.front().cloned(),
            FlowCursor::Complete => None,
        }
    }

    /// Records an answer to the current prompt and moves the cursor.
    /// On a validation error nothing changes and the same prompt stays current.
    pub fn advance(&mut self, answer: Answer) -> Result<FlowStep, ValidationError> {
        let prompt = match self.current_prompt() {
            Some(prompt) => prompt,
            None => return Ok(FlowStep::Submit(self.record.clone())),
        };

        let value = normalize(prompt.input_kind(), &answer)?;
        if prompt.expansion().is_some() && parse_count(&value) > MAX_EXPANDED_ENTRIES {
            return Err(ValidationError::TooManyEntries {
                max: MAX_EXPANDED_ENTRIES,
            });
        }
        debug!("Recorded answer for {:?}", prompt.text());
        self.record.insert(prompt.text(), value.as_str());

        let cursor = std::mem::replace(&mut self.cursor, FlowCursor::Complete);
        self.cursor = match cursor {
            FlowCursor::Static(index) => self.after_static(index, &prompt, &value),
            FlowCursor::Draining { origin, mut queue } => {
                queue.pop_front();
                if !queue.is_empty() {
                    FlowCursor::Draining { origin, queue }
                } else {
                    self.after_drain(origin)
                }
            }
            FlowCursor::Complete => FlowCursor::Complete,
        };

        Ok(match self.current_prompt() {
            Some(next) => FlowStep::Ask(next),
            None => FlowStep::Completed,
        })
    }

    fn static_prompt(&self, index: usize) -> Prompt {
        Prompt::Static {
            index,
            text: self.prompts[index],
        }
    }

    fn expansion_at(&self, index: usize) -> Option<Expansion> {
        self.static_prompt(index).expansion()
    }

    fn after_static(&self, index: usize, prompt: &Prompt, value: &str) -> FlowCursor {
        if let Some(expansion) = self.expansion_at(index) {
            let queue: VecDeque<Prompt> = expand(parse_count(value), expansion).into();
            if !queue.is_empty() {
                debug!("Expanded {:?} into {} prompts", prompt.text(), queue.len());
                return FlowCursor::Draining {
                    origin: index,
                    queue,
                };
            }
            if expansion == Expansion::Certificates {
                return FlowCursor::Complete;
            }
        }
        self.next_static(index)
    }

    fn after_drain(&self, origin: usize) -> FlowCursor {
        let is_last = origin + 1 == self.prompts.len();
        if is_last || self.expansion_at(origin) == Some(Expansion::Certificates) {
            FlowCursor::Complete
        } else {
            self.next_static(origin)
        }
    }

    fn next_static(&self, index: usize) -> FlowCursor {
        if index + 1 < self.prompts.len() {
            FlowCursor::Static(index + 1)
        } else {
            FlowCursor::Complete
        }
    }
}
