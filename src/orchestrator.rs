//! Orchestration graph — fan-out to the specialist agents, fan-in to insights.
//!
//! A completed session is handed off as an [`OrchestrationJob`] on an mpsc
//! queue; [`spawn_orchestrator`] owns the worker loop that executes jobs.
//! DomainKnowledge, ClientProfile, and Meetings run concurrently, each with a
//! per-node timeout and bounded retry; every successful record is persisted
//! before siblings finish. Insights then runs on the successful subset.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{AgentInput, AgentKind, AgentRegistry};
use crate::config::OnboardConfig;
use crate::error::{AgentError, OrchestrationError};
use crate::schema::Slots;
use crate::store::{KnowledgeStore, RecordKind};

/// Queue depth for pending orchestration jobs.
const QUEUE_CAPACITY: usize = 64;

/// One handoff from a completed conversation.
#[derive(Debug, Clone)]
pub struct OrchestrationJob {
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub client_name: String,
    pub slots: Slots,
    pub transcript: String,
}

/// Lifecycle of a single node within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum NodeStage {
    Pending,
    Running,
    Done,
    Failed { error: String },
}

impl NodeStage {
    pub fn is_done(&self) -> bool {
        matches!(self, NodeStage::Done)
    }
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// Inspectable state of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub id: Uuid,
    pub session_id: Uuid,
    pub client_name: String,
    pub status: RunStatus,
    /// True when any fan-out node failed and Insights ran on a subset.
    pub partial: bool,
    pub nodes: BTreeMap<AgentKind, NodeStage>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrchestrationRun {
    fn new(job: &OrchestrationJob) -> Self {
        let nodes = AgentKind::ALL
            .into_iter()
            .map(|kind| (kind, NodeStage::Pending))
            .collect();
        Self {
            id: job.run_id,
            session_id: job.session_id,
            client_name: job.client_name.clone(),
            status: RunStatus::Pending,
            partial: false,
            nodes,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Executes orchestration jobs and tracks their runs.
pub struct Orchestrator {
    registry: AgentRegistry,
    store: Arc<dyn KnowledgeStore>,
    config: OnboardConfig,
    runs: RwLock<HashMap<Uuid, OrchestrationRun>>,
    queue_tx: mpsc::Sender<OrchestrationJob>,
}

impl Orchestrator {
    /// Build an orchestrator plus the receiving end of its job queue. Pass
    /// the receiver to [`spawn_orchestrator`].
    pub fn new(
        registry: AgentRegistry,
        store: Arc<dyn KnowledgeStore>,
        config: OnboardConfig,
    ) -> (Arc<Self>, mpsc::Receiver<OrchestrationJob>) {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let orchestrator = Arc::new(Self {
            registry,
            store,
            config,
            runs: RwLock::new(HashMap::new()),
            queue_tx,
        });
        (orchestrator, queue_rx)
    }

    /// Register a run and enqueue its job. Returns the run id immediately;
    /// execution happens on the worker loop.
    pub async fn submit(
        &self,
        session_id: Uuid,
        client_name: String,
        slots: Slots,
        transcript: String,
    ) -> Result<Uuid, OrchestrationError> {
        let job = OrchestrationJob {
            run_id: Uuid::new_v4(),
            session_id,
            client_name,
            slots,
            transcript,
        };
        let run = OrchestrationRun::new(&job);
        let run_id = run.id;
        self.runs.write().await.insert(run_id, run);

        if self.queue_tx.send(job).await.is_err() {
            self.runs.write().await.remove(&run_id);
            return Err(OrchestrationError::QueueClosed);
        }
        info!(run_id = %run_id, session_id = %session_id, "Orchestration job enqueued");
        Ok(run_id)
    }

    pub async fn run(&self, id: Uuid) -> Result<OrchestrationRun, OrchestrationError> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(OrchestrationError::RunNotFound { id })
    }

    /// Drop finished runs that have outlived the retention window. Runs
    /// still pending or executing are kept.
    pub async fn sweep_runs(&self) {
        let retention = chrono::Duration::from_std(self.config.retention_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        let now = Utc::now();
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, run| {
            run.finished_at
                .map_or(true, |finished| now - finished <= retention)
        });
        let evicted = before - runs.len();
        if evicted > 0 {
            info!(evicted, "Evicted finished orchestration runs");
        }
    }

    pub async fn runs_for_client(&self, client_name: &str) -> Vec<OrchestrationRun> {
        let mut runs: Vec<OrchestrationRun> = self
            .runs
            .read()
            .await
            .values()
            .filter(|run| run.client_name.eq_ignore_ascii_case(client_name))
            .cloned()
            .collect();
        runs.sort_by_key(|run| std::cmp::Reverse(run.created_at));
        runs
    }

    /// Execute one job to completion. Public for the worker loop and tests.
    pub async fn execute(&self, job: OrchestrationJob) {
        info!(run_id = %job.run_id, client = %job.client_name, "Orchestration run started");
        self.set_status(job.run_id, RunStatus::Running).await;

        // The raw conversation is itself a meeting record; the Meetings node
        // analyses this transcript.
        if let Err(e) = self
            .store
            .put_record(
                RecordKind::Meeting,
                &job.client_name,
                Some(job.session_id),
                &json!({
                    "source": "onboarding_conversation",
                    "session_id": job.session_id,
                    "transcript": job.transcript,
                    "saved_at": Utc::now().to_rfc3339(),
                }),
            )
            .await
        {
            warn!(run_id = %job.run_id, error = %e, "Failed to save conversation transcript");
        }

        let input = AgentInput::new(job.client_name.clone(), job.slots.clone(), job.transcript.clone());

        let (domain, profile, meetings) = tokio::join!(
            self.run_node(&job, AgentKind::DomainKnowledge, &input, None),
            self.run_node(&job, AgentKind::ClientProfile, &input, None),
            self.run_node(&job, AgentKind::Meetings, &input, Some(job.run_id)),
        );

        let mut upstream = BTreeMap::new();
        if let Some(value) = domain {
            upstream.insert(AgentKind::DomainKnowledge, value);
        }
        if let Some(value) = profile {
            upstream.insert(AgentKind::ClientProfile, value);
        }
        if let Some(value) = meetings {
            upstream.insert(AgentKind::Meetings, value);
        }
        let partial = upstream.len() < 3;

        let mut insights_input =
            AgentInput::new(job.client_name.clone(), job.slots.clone(), job.transcript.clone());
        insights_input.upstream = upstream;

        let insights = self
            .run_node(&job, AgentKind::Insights, &insights_input, Some(job.run_id))
            .await;

        // Any node failing its retries fails the run overall, even though
        // Insights still ran and sibling records were persisted.
        let status = if insights.is_some() && !partial {
            RunStatus::Done
        } else {
            RunStatus::Failed
        };
        {
            let mut runs = self.runs.write().await;
            if let Some(run) = runs.get_mut(&job.run_id) {
                run.status = status;
                run.partial = partial;
                run.finished_at = Some(Utc::now());
            }
        }
        info!(run_id = %job.run_id, ?status, partial, "Orchestration run finished");
    }

    /// Run one node with timeout and bounded retry, persisting on success.
    async fn run_node(
        &self,
        job: &OrchestrationJob,
        kind: AgentKind,
        input: &AgentInput,
        item_id: Option<Uuid>,
    ) -> Option<serde_json::Value> {
        let agent = self.registry.get(kind);
        self.set_stage(job.run_id, kind, NodeStage::Running).await;

        let attempts = self.config.node_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.config.backoff_for(attempt - 1);
                warn!(run_id = %job.run_id, node = %kind, attempt, ?backoff, "Retrying node");
                tokio::time::sleep(backoff).await;
            }

            match tokio::time::timeout(self.config.node_timeout, agent.execute(input)).await {
                Ok(Ok(record)) => {
                    if let Err(e) = self
                        .store
                        .put_record(kind.record_kind(), &job.client_name, item_id, &record)
                        .await
                    {
                        last_error = format!("persist failed: {e}");
                        warn!(run_id = %job.run_id, node = %kind, error = %e, "Node persist failed");
                        continue;
                    }
                    self.set_stage(job.run_id, kind, NodeStage::Done).await;
                    info!(run_id = %job.run_id, node = %kind, "Node completed");
                    return Some(record);
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    warn!(run_id = %job.run_id, node = %kind, error = %e, "Node execution failed");
                }
                Err(_) => {
                    let timeout = AgentError::Timeout {
                        agent: kind.to_string(),
                        timeout: self.config.node_timeout,
                    };
                    last_error = timeout.to_string();
                    warn!(run_id = %job.run_id, node = %kind, "Node timed out");
                }
            }
        }

        error!(run_id = %job.run_id, node = %kind, error = %last_error, "Node failed after retries");
        self.set_stage(job.run_id, kind, NodeStage::Failed { error: last_error })
            .await;
        None
    }

    async fn set_status(&self, run_id: Uuid, status: RunStatus) {
        if let Some(run) = self.runs.write().await.get_mut(&run_id) {
            run.status = status;
        }
    }

    async fn set_stage(&self, run_id: Uuid, kind: AgentKind, stage: NodeStage) {
        if let Some(run) = self.runs.write().await.get_mut(&run_id) {
            run.nodes.insert(kind, stage);
        }
    }
}

/// Spawn the worker loop that drains the orchestration queue.
pub fn spawn_orchestrator(
    orchestrator: Arc<Orchestrator>,
    mut queue_rx: mpsc::Receiver<OrchestrationJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Orchestration worker started");
        while let Some(job) = queue_rx.recv().await {
            orchestrator.execute(job).await;
        }
        info!("Orchestration queue closed, worker exiting");
    })
}
