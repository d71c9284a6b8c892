use thiserror::Error;

use crate::questionnaire::prompts::{InputKind, YEAR_RANGE};

/// A user's response to one prompt, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    /// `None` means nothing was selected.
    YesNo(Option<bool>),
    /// `None` means nothing was selected.
    Year(Option<u16>),
}

impl Answer {
    /// Interprets a typed line according to what the prompt expects.
    /// Unrecognised selections become "nothing selected" and fail validation.
    pub fn from_line(kind: InputKind, line: &str) -> Self {
        let trimmed = line.trim();
        match kind {
            InputKind::FreeText => Answer::Text(line.to_string()),
            InputKind::YesNo => Answer::YesNo(match trimmed.to_ascii_lowercase().as_str() {
                "y" | "yes" => Some(true),
                "n" | "no" => Some(false),
                _ => None,
            }),
            InputKind::Year => Answer::Year(trimmed.parse().ok()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("This field cannot be empty")]
    Empty,

    #[error("Please select Yes or No")]
    YesNoRequired,

    #[error("Please select a year")]
    YearRequired,

    #[error("Please select a year between {min} and {max}", min = YEAR_RANGE.start(), max = YEAR_RANGE.end())]
    YearOutOfRange(u16),

    #[error("Please enter a number no greater than {max}")]
    TooManyEntries { max: usize },

    #[error("Expected a {expected:?} answer")]
    WrongKind { expected: InputKind },
}

/// Checks an answer against the prompt's input kind and returns the text to record.
pub fn normalize(kind: InputKind, answer: &Answer) -> Result<String, ValidationError> {
    match (kind, answer) {
        (InputKind::FreeText, Answer::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ValidationError::Empty);
            }
            Ok(text.to_string())
        }
        (InputKind::YesNo, Answer::YesNo(choice)) => match choice {
            Some(true) => Ok("Yes".to_string()),
            Some(false) => Ok("No".to_string()),
            None => Err(ValidationError::YesNoRequired),
        },
        (InputKind::Year, Answer::Year(year)) => match year {
            Some(y) if YEAR_RANGE.contains(y) => Ok(y.to_string()),
            Some(y) => Err(ValidationError::YearOutOfRange(*y)),
            None => Err(ValidationError::YearRequired),
        },
        (expected, _) => Err(ValidationError::WrongKind { expected }),
    }
}
