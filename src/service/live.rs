//! Live rating service
//!
//! A single tokio task owns the [`MatchProcessor`] and is the only writer of
//! the ledger on the live path. Callers hold a cloneable [`LiveRatingHandle`]
//! and send requests over an mpsc channel; each request is answered on its own
//! oneshot channel. The task stops once every handle has been dropped.

use crate::archive::StateSnapshot;
use crate::rating::processor::{ApplyOutcome, MatchProcessor};
use crate::types::Match;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Live rating service is not running")]
    Closed,

    #[error("Live rating service dropped the request")]
    NoReply,
}

enum Command {
    Submit {
        record: Box<Match>,
        reply: oneshot::Sender<crate::error::Result<ApplyOutcome>>,
    },
    PurgeHistory {
        match_id: String,
        reply: oneshot::Sender<crate::error::Result<usize>>,
    },
    Snapshot {
        reply: oneshot::Sender<crate::error::Result<StateSnapshot>>,
    },
}

/// Owner of the live write path
pub struct LiveRatingService {
    processor: MatchProcessor,
    receiver: mpsc::Receiver<Command>,
}

/// Cloneable client of a running [`LiveRatingService`]
#[derive(Clone)]
pub struct LiveRatingHandle {
    sender: mpsc::Sender<Command>,
}

impl LiveRatingService {
    /// Start the service task
    pub fn spawn(processor: MatchProcessor, capacity: usize) -> (LiveRatingHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let service = Self {
            processor,
            receiver,
        };

        let task = tokio::spawn(service.run());
        (LiveRatingHandle { sender }, task)
    }

    async fn run(mut self) {
        info!("Live rating service started");
        let mut handled = 0u64;

        while let Some(command) = self.receiver.recv().await {
            handled += 1;
            match command {
                Command::Submit { record, reply } => {
                    let result = self.processor.process(&record);
                    if let Err(e) = &result {
                        warn!("Match {} failed: {}", record.id, e);
                    }
                    if reply.send(result).is_err() {
                        debug!("Caller went away before match {} finished", record.id);
                    }
                }
                Command::PurgeHistory { match_id, reply } => {
                    let _ = reply.send(self.processor.purge_match_history(&match_id));
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        info!("Live rating service stopped after {} requests", handled);
    }

    fn snapshot(&self) -> crate::error::Result<StateSnapshot> {
        Ok(StateSnapshot {
            ledger: self.processor.storage().snapshot()?,
            index: self.processor.index_snapshot()?,
        })
    }
}

impl LiveRatingHandle {
    async fn request<T>(
        &self,
        command: Command,
        reply: oneshot::Receiver<crate::error::Result<T>>,
    ) -> crate::error::Result<T> {
        self.sender
            .send(command)
            .await
            .map_err(|_| ServiceError::Closed)?;
        reply.await.map_err(|_| ServiceError::NoReply)?
    }

    /// Submit a completed match
    pub async fn submit(&self, record: Match) -> crate::error::Result<ApplyOutcome> {
        let (reply, receiver) = oneshot::channel();
        self.request(
            Command::Submit {
                record: Box::new(record),
                reply,
            },
            receiver,
        )
        .await
    }

    /// Remove the history entries of a match
    pub async fn purge_match_history(
        &self,
        match_id: impl Into<String>,
    ) -> crate::error::Result<usize> {
        let (reply, receiver) = oneshot::channel();
        self.request(
            Command::PurgeHistory {
                match_id: match_id.into(),
                reply,
            },
            receiver,
        )
        .await
    }

    /// Consistent copy of the ledger and index
    pub async fn snapshot(&self) -> crate::error::Result<StateSnapshot> {
        let (reply, receiver) = oneshot::channel();
        self.request(Command::Snapshot { reply }, receiver).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
