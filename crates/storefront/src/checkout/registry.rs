//! Live checkout sessions.
//!
//! Sessions are held in a `moka` cache with idle expiry. A customer who
//! walks away simply stops touching their session; it is evicted and any
//! fee lookup still in flight finishes into a recalculator nobody reads.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use mbuli_core::CheckoutSessionId;

use super::assembler::OrderAssembler;
use super::session::CheckoutSession;
use crate::delivery::FeeEstimator;

const MAX_SESSIONS: u64 = 10_000;

/// Creates and looks up checkout sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<CheckoutSessionId, Arc<CheckoutSession>>,
    estimator: FeeEstimator,
    debounce: Duration,
    assembler: OrderAssembler,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(
        estimator: FeeEstimator,
        debounce: Duration,
        assembler: OrderAssembler,
        idle_timeout: Duration,
    ) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle_timeout)
            .build();

        Self {
            sessions,
            estimator,
            debounce,
            assembler,
        }
    }

    /// Start a new session.
    pub async fn create(&self) -> Arc<CheckoutSession> {
        let session = Arc::new(CheckoutSession::new(
            CheckoutSessionId::generate(),
            self.estimator.clone(),
            self.debounce,
            self.assembler.clone(),
        ));
        self.sessions
            .insert(session.id(), Arc::clone(&session))
            .await;
        tracing::debug!(session = %session.id(), "Checkout session created");
        session
    }

    /// Look up a live session. Touching it resets its idle timer.
    pub async fn get(&self, id: CheckoutSessionId) -> Option<Arc<CheckoutSession>> {
        self.sessions.get(&id).await
    }

    /// Drop a session.
    pub async fn remove(&self, id: CheckoutSessionId) {
        self.sessions.invalidate(&id).await;
    }
}
