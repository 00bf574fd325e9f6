//! Per-customer checkout state machine.
//!
//! ```text
//! Idle ──address──► AwaitingEstimate ──debounce──► Estimating ──► Ready ──► Placing ──► Placed
//!                        ▲                              │                     │
//!                        └──────── estimate failed ─────┘◄──── order failed ──┘
//! ```
//!
//! The fee half of the phase comes from the session's [`FeeRecalculator`];
//! `Placing` and `Placed` are tracked here. Customer fields survive every
//! failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use mbuli_core::{CheckoutSessionId, OrderId};

use super::assembler::{CheckoutError, OrderAssembler, ValidationError};
use crate::delivery::{FeeEstimator, FeeRecalculator, FeeState};
use crate::models::{CustomerDetails, Order};
use crate::services::notifications::{Notification, NotificationLog, Notifier};

/// Where a checkout session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    AwaitingEstimate,
    Estimating,
    Ready,
    Placing,
    Placed,
}

impl CheckoutPhase {
    fn from_fee(state: &FeeState) -> Self {
        match state {
            FeeState::Idle => Self::Idle,
            FeeState::AwaitingEstimate { .. } | FeeState::Failed { .. } => Self::AwaitingEstimate,
            FeeState::Estimating { .. } => Self::Estimating,
            FeeState::Ready { .. } => Self::Ready,
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    placing: bool,
    placed: Option<OrderId>,
}

/// Clears the `placing` flag even if the caller stops polling mid-placement.
struct PlacingGuard<'a> {
    progress: &'a Mutex<Progress>,
}

impl Drop for PlacingGuard<'_> {
    fn drop(&mut self) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .placing = false;
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: CheckoutSessionId,
    pub phase: CheckoutPhase,
    pub customer: CustomerDetails,
    pub fee: FeeState,
    pub order_id: Option<OrderId>,
}

/// One customer's checkout.
pub struct CheckoutSession {
    id: CheckoutSessionId,
    customer: Mutex<CustomerDetails>,
    progress: Mutex<Progress>,
    recalculator: FeeRecalculator,
    assembler: OrderAssembler,
    notifications: Arc<NotificationLog>,
}

impl CheckoutSession {
    #[must_use]
    pub fn new(
        id: CheckoutSessionId,
        estimator: FeeEstimator,
        debounce: Duration,
        assembler: OrderAssembler,
    ) -> Self {
        let notifications = Arc::new(NotificationLog::default());
        let recalculator = FeeRecalculator::new(
            estimator,
            debounce,
            Arc::clone(&notifications) as Arc<dyn Notifier>,
        );
        Self {
            id,
            customer: Mutex::new(CustomerDetails::default()),
            progress: Mutex::new(Progress::default()),
            recalculator,
            assembler,
            notifications,
        }
    }

    #[must_use]
    pub const fn id(&self) -> CheckoutSessionId {
        self.id
    }

    fn lock_customer(&self) -> MutexGuard<'_, CustomerDetails> {
        self.customer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.lock_progress().placed.is_some() {
            Err(ValidationError::AlreadyPlaced)
        } else {
            Ok(())
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CheckoutPhase {
        let progress = self.lock_progress();
        if progress.placed.is_some() {
            CheckoutPhase::Placed
        } else if progress.placing {
            CheckoutPhase::Placing
        } else {
            CheckoutPhase::from_fee(&self.recalculator.state())
        }
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::AlreadyPlaced` once the order is placed.
    pub fn set_contact(&self, name: &str, phone: &str) -> Result<(), ValidationError> {
        self.ensure_open()?;
        let mut customer = self.lock_customer();
        customer.name = name.to_string();
        customer.phone = phone.to_string();
        Ok(())
    }

    /// Record an edit to the address field and schedule fee recalculation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::AlreadyPlaced` once the order is placed.
    pub fn set_address(&self, address: &str) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.lock_customer().address = address.to_string();
        self.recalculator.address_changed(address);
        Ok(())
    }

    #[must_use]
    pub fn fee_state(&self) -> FeeState {
        self.recalculator.state()
    }

    #[must_use]
    pub const fn recalculator(&self) -> &FeeRecalculator {
        &self.recalculator
    }

    /// Notifications not yet shown, oldest first. Draining removes them.
    #[must_use]
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.drain()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            phase: self.phase(),
            customer: self.lock_customer().clone(),
            fee: self.recalculator.state(),
            order_id: self.lock_progress().placed,
        }
    }

    /// Place the order with the current customer details and fee.
    ///
    /// Success and failure are both reported through the session's
    /// notifications. On success the fee state is reset and the session is
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if validation or persistence fails; entered
    /// customer fields and the cart are kept.
    pub async fn place_order(&self) -> Result<Order, CheckoutError> {
        let result = self.try_place_order().await;

        match &result {
            Ok(_) => self.notifications.notify(Notification::success(
                "Order Placed!",
                "Thank you for your purchase. We will contact you shortly to confirm.",
            )),
            Err(CheckoutError::Validation(e)) => self
                .notifications
                .notify(Notification::destructive("Cannot place order", e.to_string())),
            Err(e) => {
                tracing::error!(error = %e, cart = %self.id, "Order placement failed");
                self.notifications.notify(Notification::destructive(
                    "Order failed",
                    "We could not save your order. Your cart has been kept, please try again.",
                ));
            }
        }

        result
    }

    async fn try_place_order(&self) -> Result<Order, CheckoutError> {
        {
            let mut progress = self.lock_progress();
            if progress.placed.is_some() {
                return Err(ValidationError::AlreadyPlaced.into());
            }
            if progress.placing {
                return Err(ValidationError::PlacementInProgress.into());
            }
            progress.placing = true;
        }
        let _guard = PlacingGuard {
            progress: &self.progress,
        };

        let customer = self.lock_customer().clone();
        let fee = self.recalculator.state();
        // The quote must belong to the address being submitted.
        let quote = fee
            .quote()
            .filter(|_| fee.address() == Some(customer.address.as_str()));

        let order = self
            .assembler
            .place_order(self.id, &customer, quote)
            .await?;

        self.lock_progress().placed = Some(order.id);
        self.recalculator.reset();
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mbuli_core::Tzs;

    use super::*;
    use crate::db::{MemoryStore, Store};
    use crate::delivery::estimator::tests::ScriptedResolver;
    use crate::delivery::{DistanceKm, DistanceResolver, FeeQuote};
    use crate::services::OrderHub;

    fn session() -> CheckoutSession {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let resolver: Arc<dyn DistanceResolver> = Arc::new(ScriptedResolver::new([Ok(1.0)]));
        let hub = OrderHub::new(Arc::clone(&store));
        CheckoutSession::new(
            CheckoutSessionId::generate(),
            FeeEstimator::new(resolver),
            Duration::from_secs(1),
            OrderAssembler::new(store, hub),
        )
    }

    #[test]
    fn test_phase_follows_fee_state() {
        let address = "Kariakoo Market".to_string();
        let quote = FeeQuote {
            fee: Tzs::from_shillings(2_500),
            distance_km: DistanceKm::new(10.0).unwrap(),
        };

        assert_eq!(CheckoutPhase::from_fee(&FeeState::Idle), CheckoutPhase::Idle);
        assert_eq!(
            CheckoutPhase::from_fee(&FeeState::Estimating {
                address: address.clone()
            }),
            CheckoutPhase::Estimating
        );
        assert_eq!(
            CheckoutPhase::from_fee(&FeeState::Failed {
                address: address.clone(),
                message: "no route".to_string()
            }),
            CheckoutPhase::AwaitingEstimate
        );
        assert_eq!(
            CheckoutPhase::from_fee(&FeeState::Ready { address, quote }),
            CheckoutPhase::Ready
        );
    }

    #[tokio::test]
    async fn test_contact_kept_after_failed_placement() {
        let session = session();
        session.set_contact("Asha", "0712 345 678").unwrap();

        assert!(session.place_order().await.is_err());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.customer.name, "Asha");
        assert_eq!(snapshot.phase, CheckoutPhase::Idle);
        assert_eq!(session.drain_notifications().len(), 1);
    }

    #[test]
    fn test_placing_guard_clears_flag() {
        let progress = Mutex::new(Progress {
            placing: true,
            placed: None,
        });
        drop(PlacingGuard {
            progress: &progress,
        });
        assert!(!progress.lock().unwrap().placing);
    }
}
