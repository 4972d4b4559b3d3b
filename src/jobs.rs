use crate::{
    models::InboundMessage,
    pipeline::{Outcome, PipelineError, Responder},
};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// Recent update ids kept for dedup and status lookups.
const STATUS_RETENTION: usize = 1024;

#[derive(Clone)]
pub struct UpdateQueue {
    tx: mpsc::Sender<Job>,
    statuses: Arc<Mutex<StatusTable>>,
}

struct Job {
    id: Uuid,
    message: InboundMessage,
}

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("update {0} was already accepted")]
    Duplicate(i64),
    #[error("dispatch queue is full")]
    Full,
    #[error("dispatch worker is not running")]
    Closed,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed { outcome: String },
    Failed { error: String, stage: Option<String> },
}

#[derive(Clone, Debug, Serialize)]
pub struct JobInfo {
    pub update_id: i64,
    pub job_id: String,
    #[serde(flatten)]
    pub state: JobState,
}

#[derive(Default)]
struct StatusTable {
    entries: HashMap<i64, (Uuid, JobState)>,
    order: VecDeque<i64>,
}

impl StatusTable {
    fn admit(&mut self, update_id: i64, id: Uuid) -> bool {
        if self.entries.contains_key(&update_id) {
            return false;
        }
        self.entries.insert(update_id, (id, JobState::Queued));
        self.order.push_back(update_id);
        while self.order.len() > STATUS_RETENTION {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        true
    }

    fn set(&mut self, update_id: i64, state: JobState) {
        if let Some(entry) = self.entries.get_mut(&update_id) {
            entry.1 = state;
        }
    }

    fn forget(&mut self, update_id: i64) {
        if self.entries.remove(&update_id).is_some() {
            self.order.retain(|id| *id != update_id);
        }
    }
}

impl UpdateQueue {
    /// Starts the dispatcher. Each dequeued update runs in its own task so a
    /// slow product page only delays its own chat.
    pub fn spawn(responder: Responder, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let statuses = Arc::new(Mutex::new(StatusTable::default()));
        let statuses_bg = statuses.clone();

        let handle = tokio::spawn(async move {
            while let Some(Job { id, message }) = rx.recv().await {
                let responder = responder.clone();
                let update_id = message.update_id;
                let work = async move { responder.handle(&message).await };
                tokio::spawn(run_job(statuses_bg.clone(), id, update_id, work));
            }
            info!(target = "affilink.jobs", "dispatcher stopped");
        });

        (Self { tx, statuses }, handle)
    }

    /// Accepts an update without waiting for the worker. Redelivered update
    /// ids are rejected so each update is processed at most once.
    pub async fn enqueue(&self, message: InboundMessage) -> Result<Uuid, EnqueueError> {
        let update_id = message.update_id;
        let id = Uuid::new_v4();
        {
            let mut guard = self.statuses.lock().await;
            if !guard.admit(update_id, id) {
                return Err(EnqueueError::Duplicate(update_id));
            }
        }
        let sent = self.tx.try_send(Job { id, message });
        if let Err(err) = sent {
            // Let the platform's retry get a fresh chance.
            self.statuses.lock().await.forget(update_id);
            return Err(match err {
                mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            });
        }
        debug!(target = "affilink.jobs", update_id, job_id = %id, "update queued");
        Ok(id)
    }

    pub async fn get(&self, update_id: i64) -> Option<JobInfo> {
        let guard = self.statuses.lock().await;
        guard.entries.get(&update_id).map(|(id, state)| JobInfo {
            update_id,
            job_id: id.to_string(),
            state: state.clone(),
        })
    }

    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn run_job<F>(statuses: Arc<Mutex<StatusTable>>, id: Uuid, update_id: i64, work: F)
where
    F: Future<Output = Result<Outcome, PipelineError>> + Send + 'static,
{
    statuses.lock().await.set(update_id, JobState::Running);

    // Inner task so a panic in handling is contained and recorded.
    let result = tokio::spawn(work).await;
    let state = match result {
        Ok(Ok(outcome)) => JobState::Completed {
            outcome: describe(&outcome),
        },
        Ok(Err(err)) => {
            warn!(
                target = "affilink.jobs",
                update_id,
                job_id = %id,
                kind = ?err.kind(),
                stage = err.stage(),
                "update finished with failure"
            );
            failed(&err)
        }
        Err(join_err) => {
            error!(target = "affilink.jobs", update_id, job_id = %id, error = %join_err, "update task panicked");
            failed(&PipelineError::internal("dispatch", join_err.to_string()))
        }
    };
    statuses.lock().await.set(update_id, state);
}

fn failed(err: &PipelineError) -> JobState {
    JobState::Failed {
        error: err.detail().to_string(),
        stage: Some(err.stage().to_string()),
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Replied { intent } => format!("replied:{intent}"),
        Outcome::ProductSent { asin, link, .. } => format!("product:{asin}:{}", link.provider),
        Outcome::ExtractionFailed => "extraction_failed".to_string(),
    }
}
