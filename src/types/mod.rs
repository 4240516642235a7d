//! Public types for the sluice API.

mod job;
mod outcome;

pub use job::{CallMethod, JobId, JobRequest, JobTicket};
pub use outcome::{CallResult, JobOutcome, PollStatus};
