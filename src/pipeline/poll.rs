//! Wait for an uploaded file to leave `PROCESSING`.
//!
//! The loop sleeps through an injected [`Sleeper`], so tests drive it through
//! any state sequence instantly while production waits on the tokio timer.
//!
//! By default there is no bound: a file stuck in `PROCESSING` keeps the
//! caller waiting. [`PollPolicy::max_attempts`] adds one when set.

use crate::config::EstimatorConfig;
use crate::error::EstimatorError;
use crate::progress::ProgressCallback;
use crate::remote::{RemoteFile, RemoteModel};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Source of delays for the poll loop.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delays on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How often, and how many times, to check a file's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits indefinitely.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Terminal handle plus the number of status checks it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub file: RemoteFile,
    pub polls: u32,
}

/// Poll `initial` until its state is terminal.
///
/// A handle that is already terminal returns immediately with zero polls.
/// Each further check is preceded by one `policy.interval` sleep. The
/// terminal state is returned as-is, `FAILED` included; deciding what to do
/// with it is the caller's job.
pub async fn wait_until_terminal(
    remote: &dyn RemoteModel,
    initial: RemoteFile,
    policy: PollPolicy,
    sleeper: &dyn Sleeper,
    progress: Option<&ProgressCallback>,
) -> Result<PollOutcome, EstimatorError> {
    let mut file = initial;
    let mut polls: u32 = 0;

    while !file.state.is_terminal() {
        if let Some(max) = policy.max_attempts {
            if polls >= max {
                return Err(EstimatorError::PollTimeout {
                    name: file.name,
                    attempts: polls,
                });
            }
        }

        sleeper.sleep(policy.interval).await;
        file = remote.get_file(&file.name).await?;
        polls += 1;

        debug!("Status check {} for {}: {}", polls, file.name, file.state);
        if let Some(cb) = progress {
            cb.on_poll(polls, file.state);
        }
    }

    Ok(PollOutcome { file, polls })
}
