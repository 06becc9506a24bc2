//! The embedded Horde worker loop.
//!
//! Pops text jobs from the cluster, runs them through the local coordinator
//! like any other client, and submits the results. Job payloads arrive in
//! the kobold wire dialect, so the worker reuses the same translator as the
//! HTTP surface. Submission happens on a detached task so the loop can pop
//! the next job while the previous result is still in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use grimoire_core::Coordinator;
use grimoire_core::coordinator::Admission;
use grimoire_core::dialect::KoboldGenerationRequest;
use grimoire_core::domain::GenKey;

use crate::client::{BRIDGE_AGENT, HordeClient, PopRequest};
use crate::penalty::{Escalation, PenaltyState};

/// Poll interval while waiting for the local server to come up.
const STARTUP_POLL: Duration = Duration::from_secs(3);

/// Wait after a failed cluster pop.
const POP_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Wait while the engine is busy with a local request.
const BUSY_WAIT: Duration = Duration::from_secs(5);

/// Generation attempts per job before it is abandoned.
const MAX_JOB_ATTEMPTS: u32 = 5;

/// Empty pops before the worker logs that it is going sleepy.
const SLEEPY_LOG_MARK: u64 = 20;

/// Static worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_name: String,
    pub model_name: String,
    /// Advertised per-job output budget.
    pub max_length: u32,
    /// Advertised context budget.
    pub max_context_length: u32,
}

/// Session counters, updated by detached submit tasks.
#[derive(Debug, Default)]
struct SessionStats {
    jobs: AtomicU64,
    /// Kudos are fractional; stored as hundredths.
    kudos_centis: AtomicU64,
}

pub struct HordeWorker {
    client: HordeClient,
    config: WorkerConfig,
    coordinator: Arc<Coordinator>,
    penalties: Arc<PenaltyState>,
    stats: Arc<SessionStats>,
}

impl HordeWorker {
    #[must_use]
    pub fn new(
        client: HordeClient,
        config: WorkerConfig,
        coordinator: Arc<Coordinator>,
        penalties: Arc<PenaltyState>,
    ) -> Self {
        Self {
            client,
            config,
            coordinator,
            penalties,
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Run until cancelled or the penalty ceiling is reached.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            worker = %self.config.worker_name,
            model = %self.config.model_name,
            "embedded horde worker starting"
        );

        if !self.wait_for_local_ready(&cancel).await {
            return;
        }
        info!(worker = %self.config.worker_name, "embedded horde worker started");

        let mut sleepy_counter: u64 = 0;
        while !cancel.is_cancelled() && !self.penalties.is_exhausted() {
            match self.penalties.escalate_if_needed() {
                Escalation::Proceed => {}
                Escalation::Pause(pause) => {
                    warn!(
                        minutes = pause.as_secs() / 60,
                        "too many failures, pausing worker; it will resume automatically"
                    );
                    if !idle(&cancel, pause).await {
                        break;
                    }
                    continue;
                }
                Escalation::Shutdown => break,
            }

            // Don't pop while a local request holds the engine.
            if self.coordinator.gate().is_busy() {
                if !idle(&cancel, Duration::from_millis(200)).await {
                    break;
                }
                continue;
            }

            let popped = match self.client.pop(&self.pop_request()).await {
                Ok(popped) => popped,
                Err(err) => {
                    self.penalties.record_failure();
                    warn!(%err, "failed to fetch a horde job, backing off");
                    if !idle(&cancel, POP_FAILURE_BACKOFF).await {
                        break;
                    }
                    continue;
                }
            };

            let Some(job_id) = popped.id.filter(|id| !id.is_empty()) else {
                sleepy_counter += 1;
                if sleepy_counter == SLEEPY_LOG_MARK {
                    info!("no recent horde jobs, entering low power mode");
                }
                if !idle(&cancel, sleepy_delay(sleepy_counter)).await {
                    break;
                }
                continue;
            };
            sleepy_counter = 0;

            match self.run_job(&cancel, &job_id, popped.payload).await {
                Some(text) => self.spawn_submit(job_id, text),
                None => warn!(job_id = %job_id, "abandoned horde job after repeated errors"),
            }
            if !idle(&cancel, Duration::from_millis(100)).await {
                break;
            }
        }

        if self.penalties.is_exhausted() {
            error!("horde worker shutdown: too many errors");
        } else {
            info!(
                jobs = self.stats.jobs.load(Ordering::Relaxed),
                "horde worker shutdown"
            );
        }
    }

    /// Poll the coordinator until the server marks itself ready.
    async fn wait_for_local_ready(&self, cancel: &CancellationToken) -> bool {
        while !self.coordinator.is_ready() {
            if !idle(cancel, STARTUP_POLL).await {
                return false;
            }
        }
        true
    }

    fn pop_request(&self) -> PopRequest {
        PopRequest {
            name: self.config.worker_name.clone(),
            models: vec![self.config.model_name.clone()],
            max_length: self.config.max_length,
            max_context_length: self.config.max_context_length,
            priority_usernames: Vec::new(),
            softprompts: Vec::new(),
            bridge_agent: BRIDGE_AGENT.to_string(),
        }
    }

    /// Run one popped job through the local coordinator.
    ///
    /// Retries while the engine is busy; gives up after
    /// [`MAX_JOB_ATTEMPTS`] failed generation attempts.
    async fn run_job(
        &self,
        cancel: &CancellationToken,
        job_id: &str,
        payload: Value,
    ) -> Option<String> {
        let request = match translate_payload(payload, self.coordinator.allocated_ctx()) {
            Ok(request) => request,
            Err(err) => {
                warn!(job_id = %job_id, %err, "horde payload did not parse, abandoning job");
                return None;
            }
        };
        info!(
            job_id = %job_id,
            max_length = request.max_length,
            max_context = request.max_context_length,
            "horde job received, starting generation"
        );

        let mut attempts = 0;
        while !cancel.is_cancelled() && !self.penalties.is_exhausted() {
            let permit = match self.coordinator.admit().await {
                Admission::Admitted(permit) => permit,
                Admission::Rejected => {
                    info!("engine busy, horde job waiting");
                    if !idle(cancel, BUSY_WAIT).await {
                        return None;
                    }
                    continue;
                }
            };

            let mut request = request.clone();
            request.genkey = horde_genkey();
            match self.coordinator.run(permit, request).await {
                Ok(text) => return Some(text),
                Err(err) => {
                    attempts += 1;
                    warn!(job_id = %job_id, %err, attempts, "horde generation attempt failed");
                    if attempts > MAX_JOB_ATTEMPTS {
                        return None;
                    }
                }
            }
        }
        None
    }

    /// Submit off the main loop so the next pop is not held up.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn spawn_submit(&self, job_id: String, generation: String) {
        let client = self.client.clone();
        let penalties = Arc::clone(&self.penalties);
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            match client.submit(&job_id, &generation).await {
                Ok(reward) => {
                    penalties.record_reward();
                    stats.jobs.fetch_add(1, Ordering::Relaxed);
                    stats
                        .kudos_centis
                        .fetch_add((reward.max(0.0) * 100.0) as u64, Ordering::Relaxed);
                    let total = stats.kudos_centis.load(Ordering::Relaxed) as f64 / 100.0;
                    info!(
                        job_id = %job_id,
                        reward,
                        total_kudos = total,
                        jobs = stats.jobs.load(Ordering::Relaxed),
                        "horde job submitted"
                    );
                }
                Err(err) => {
                    penalties.record_failure();
                    warn!(job_id = %job_id, %err, "horde job submit failed");
                }
            }
        });
    }
}

/// Translate a popped kobold-dialect payload into a canonical request.
fn translate_payload(
    payload: Value,
    allocated_ctx: u32,
) -> Result<grimoire_core::GenerationRequest, serde_json::Error> {
    let wire: KoboldGenerationRequest = serde_json::from_value(payload)?;
    // Horde jobs run quiet; prompts belong to remote users.
    Ok(wire.into_request(allocated_ctx, true))
}

/// Generation key marking a job as worker-owned, so local abort calls with
/// client keys cannot touch it.
fn horde_genkey() -> GenKey {
    #[allow(clippy::cast_possible_truncation)]
    let n = 100 + (uuid::Uuid::new_v4().as_u128() % 900) as u16;
    GenKey::from(format!("HORDEREQ_{n}"))
}

/// Empty-pop backoff: 1s at first, stretching to 3s as the queue stays dry.
fn sleepy_delay(counter: u64) -> Duration {
    let secs = if counter < 10 {
        1
    } else if counter < 25 {
        2
    } else {
        3
    };
    Duration::from_secs(secs)
}

/// Sleep unless cancelled; false means the worker should stop.
async fn idle(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
