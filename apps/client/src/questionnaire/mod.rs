// Dynamic career questionnaire: a fixed prompt list where the project and
// certificate counts expand into per-entry sub-prompts.
// Pure state machine, no I/O.

pub mod flow;
pub mod prompts;
pub mod record;
pub mod validation;

pub use flow::{FlowController, FlowStep};
pub use prompts::InputKind;
pub use record::AnswerRecord;
pub use validation::Answer;
