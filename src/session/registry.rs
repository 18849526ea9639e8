//! In-memory registry of live sessions

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::providers::GenerationService;
use super::error::SessionError;
use super::machine::MockupSession;

/// Owns every live session; nothing outlives the process
pub struct SessionManager {
    sessions: DashMap<Uuid, Arc<MockupSession>>,
    generator: Arc<dyn GenerationService>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionManager {
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        SessionManager {
            sessions: DashMap::new(),
            generator,
            max_sessions: 0,
            idle_ttl: Duration::ZERO,
        }
        .with_limits(&SessionSettings::default())
    }

    pub fn with_limits(mut self, limits: &SessionSettings) -> Self {
        self.max_sessions = limits.max_sessions;
        self.idle_ttl = Duration::from_secs(limits.idle_ttl_secs);
        self
    }

    /// Start a fresh session: no logo, no product, empty history, idle
    ///
    /// At capacity, idle sessions are swept once before giving up.
    pub fn create(&self) -> Result<Arc<MockupSession>, SessionError> {
        if self.sessions.len() >= self.max_sessions {
            self.evict_idle();
            if self.sessions.len() >= self.max_sessions {
                return Err(SessionError::Capacity {
                    limit: self.max_sessions,
                });
            }
        }

        let session = Arc::new(MockupSession::new(self.generator.clone()));
        self.sessions.insert(session.id(), session.clone());
        info!(session_id = %session.id(), live_sessions = self.sessions.len(), "Session created");
        Ok(session)
    }

    /// Look up a session and mark it active
    pub fn get(&self, id: &Uuid) -> Option<Arc<MockupSession>> {
        let session = self.sessions.get(id).map(|entry| entry.value().clone())?;
        session.touch();
        Some(session)
    }

    /// End a session. An outstanding call still settles on its own task and
    /// the result is dropped with the session.
    pub fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                let age = Utc::now() - session.created_at();
                info!(session_id = %id, age_seconds = age.num_seconds(), "Session ended");
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn generator_code(&self) -> &'static str {
        self.generator.code()
    }

    /// Drop sessions idle for at least the configured TTL. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// Sessions with an outstanding call are kept regardless of age.
    fn evict_idle_at(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.sessions.retain(|id, session| {
            if session.is_busy() || session.idle_for(now) < self.idle_ttl {
                return true;
            }
            debug!(session_id = %id, "Evicting idle session");
            evicted += 1;
            false
        });

        if evicted > 0 {
            info!(evicted, live_sessions = self.sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    /// Sweep idle sessions every `every` until the manager is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    warn!("Session manager dropped, stopping sweeper");
                    break;
                };
                manager.evict_idle();
            }
        })
    }
}
