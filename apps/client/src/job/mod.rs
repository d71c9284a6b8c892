// Remote job lifecycle: dataset generation, fine-tuning and progress polling.

pub mod poller;
pub mod status;
pub mod tracker;

pub use poller::PollSettings;
pub use status::{JobState, JobStatus};
pub use tracker::JobTracker;
