//! In-memory bot job table
//!
//! Each job runs one `MeetingBot` from join to finished recording and forwards
//! its status events to the optional NATS publisher.

mod job;
mod manager;

pub use job::{BotJob, CreateJob, JobStatus, Platform};
pub use manager::{BotManager, JobError};
