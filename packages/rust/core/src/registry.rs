//! Per-user job and upload cache registry.
//!
//! [`JobRegistry`] tracks at most one live analysis per [`Identity`] together
//! with its cancellation token, plus the most recently uploaded raw content
//! for each identity. Both maps sit behind a single mutex; every operation
//! takes it once, does only map work, and releases it. No reasoning call or
//! `.await` ever happens while it is held.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lexrisk_shared::{Identity, LexRiskError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobId / JobHandle
// ---------------------------------------------------------------------------

/// Identifies one run of an analysis (UUID v7, time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What [`JobRegistry::start_job`] hands back to the job runner.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    token: CancellationToken,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// JobRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ActiveJob {
    id: JobId,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct RegistryState {
    jobs: HashMap<Identity, ActiveJob>,
    cache: HashMap<Identity, String>,
}

/// Registry of live jobs and cached uploads, keyed by identity.
#[derive(Debug, Default)]
pub struct JobRegistry {
    state: Mutex<RegistryState>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation leaves both maps consistent, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new job for `identity` and return its handle.
    ///
    /// A job already registered for the identity is superseded: its token is
    /// cancelled and its entry replaced.
    pub fn start_job(&self, identity: &Identity) -> JobHandle {
        let job = ActiveJob {
            id: JobId::new(),
            token: CancellationToken::new(),
        };
        let handle = JobHandle {
            id: job.id,
            token: job.token.clone(),
        };

        let superseded = self.lock().jobs.insert(identity.clone(), job);

        if let Some(previous) = superseded {
            previous.token.cancel();
            info!(user = %identity, previous = %previous.id, job = %handle.id, "superseded running analysis");
        } else {
            debug!(user = %identity, job = %handle.id, "job registered");
        }

        handle
    }

    /// Cancel the live job for `identity` and drop its cached upload.
    pub fn cancel_job(&self, identity: &Identity) -> Result<()> {
        let removed = {
            let mut state = self.lock();
            let job = state.jobs.remove(identity);
            if job.is_some() {
                state.cache.remove(identity);
            }
            job
        };

        match removed {
            Some(job) => {
                job.token.cancel();
                info!(user = %identity, job = %job.id, "analysis cancelled");
                Ok(())
            }
            None => Err(LexRiskError::not_found(identity)),
        }
    }

    /// Deregister `job` after it reached a terminal state.
    ///
    /// Only removes the entry if it still belongs to `job`, so a superseded
    /// run cannot deregister its replacement. Never cancels. Idempotent.
    pub fn finish_job(&self, identity: &Identity, job: JobId) {
        let mut state = self.lock();
        if state.jobs.get(identity).is_some_and(|active| active.id == job) {
            state.jobs.remove(identity);
            drop(state);
            debug!(user = %identity, %job, "job deregistered");
        }
    }

    /// Whether `identity` has a live job.
    pub fn is_running(&self, identity: &Identity) -> bool {
        self.lock().jobs.contains_key(identity)
    }

    /// Id of the live job for `identity`, if any.
    pub fn active_job(&self, identity: &Identity) -> Option<JobId> {
        self.lock().jobs.get(identity).map(|job| job.id)
    }

    /// Number of live jobs across all identities.
    pub fn active_jobs(&self) -> usize {
        self.lock().jobs.len()
    }

    // -----------------------------------------------------------------------
    // Upload cache
    // -----------------------------------------------------------------------

    /// Store `content` as the latest upload for `identity`, replacing any previous one.
    pub fn set_cache(&self, identity: &Identity, content: String) {
        let chars = content.chars().count();
        self.lock().cache.insert(identity.clone(), content);
        debug!(user = %identity, chars, "upload cached");
    }

    /// Latest cached upload for `identity`.
    pub fn get_cache(&self, identity: &Identity) -> Option<String> {
        self.lock().cache.get(identity).cloned()
    }

    /// Drop the cached upload for `identity`.
    pub fn clear_cache(&self, identity: &Identity) -> Result<()> {
        match self.lock().cache.remove(identity) {
            Some(_) => Ok(()),
            None => Err(LexRiskError::not_found(identity)),
        }
    }

    /// Number of cached uploads across all identities.
    pub fn cached_entries(&self) -> usize {
        self.lock().cache.len()
    }
}
