//! Debounced fee recalculation for a single address field.
//!
//! Every address change bumps a generation counter and starts a debounce
//! task. A task whose generation is no longer current when its delay ends
//! does nothing. A task that does resolve tags its result with the address
//! it was issued for and only commits it if the field still holds that
//! address. In-flight resolver calls are never cancelled; their results are
//! dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use super::estimator::{FeeEstimate, FeeEstimator, FeeQuote};
use crate::services::notifications::{Notification, Notifier};

/// Quiet period an address must survive before it is resolved.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// What the checkout page knows about the delivery fee.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeeState {
    /// No address entered.
    Idle,
    /// Address too short, or waiting out the debounce window.
    AwaitingEstimate { address: String },
    /// Resolver call in flight.
    Estimating { address: String },
    /// Fee known for `address`.
    Ready { address: String, quote: FeeQuote },
    /// Estimation failed; fee unknown until the address changes.
    Failed { address: String, message: String },
}

impl FeeState {
    /// The usable quote, if the fee is known.
    #[must_use]
    pub const fn quote(&self) -> Option<&FeeQuote> {
        match self {
            Self::Ready { quote, .. } => Some(quote),
            _ => None,
        }
    }

    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AwaitingEstimate { address }
            | Self::Estimating { address }
            | Self::Ready { address, .. }
            | Self::Failed { address, .. } => Some(address),
        }
    }
}

#[derive(Default)]
struct AddressField {
    address: String,
    generation: u64,
}

struct Inner {
    estimator: FeeEstimator,
    debounce: Duration,
    field: Mutex<AddressField>,
    state: watch::Sender<FeeState>,
    notifier: Arc<dyn Notifier>,
}

impl Inner {
    fn lock_field(&self) -> MutexGuard<'_, AddressField> {
        self.field.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn recalculate(self: Arc<Self>, generation: u64, address: String) {
        tokio::time::sleep(self.debounce).await;

        {
            let field = self.lock_field();
            if field.generation != generation {
                return;
            }
            self.state.send_replace(FeeState::Estimating {
                address: address.clone(),
            });
        }

        let (next, failure) = match self.estimator.estimate_fee(&address).await {
            Ok(FeeEstimate::Quoted(quote)) => (
                FeeState::Ready {
                    address: address.clone(),
                    quote,
                },
                None,
            ),
            Ok(FeeEstimate::Incomplete) => (
                FeeState::AwaitingEstimate {
                    address: address.clone(),
                },
                None,
            ),
            Err(e) => {
                let message = e.to_string();
                (
                    FeeState::Failed {
                        address: address.clone(),
                        message: message.clone(),
                    },
                    Some(message),
                )
            }
        };

        {
            let field = self.lock_field();
            if field.address != address {
                tracing::debug!(generation, "Discarding fee for superseded address");
                return;
            }
            self.state.send_replace(next);
        }

        if let Some(message) = failure {
            self.notifier.notify(Notification::destructive(
                "Could not calculate delivery fee",
                message,
            ));
        }
    }
}

/// Stateful wrapper around [`FeeEstimator`] bound to one address input.
#[derive(Clone)]
pub struct FeeRecalculator {
    inner: Arc<Inner>,
}

impl FeeRecalculator {
    #[must_use]
    pub fn new(estimator: FeeEstimator, debounce: Duration, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(FeeState::Idle);
        Self {
            inner: Arc::new(Inner {
                estimator,
                debounce,
                field: Mutex::new(AddressField::default()),
                state,
                notifier,
            }),
        }
    }

    /// Record a new value of the address field.
    ///
    /// The visible fee is invalidated immediately. Resolution starts once
    /// the address has gone unchanged for the debounce window. Re-submitting
    /// the current address is a no-op unless the last estimate failed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn address_changed(&self, address: &str) {
        let mut field = self.inner.lock_field();
        if field.address == address
            && !matches!(*self.inner.state.borrow(), FeeState::Failed { .. })
        {
            return;
        }

        field.generation = field.generation.wrapping_add(1);
        field.address = address.to_string();
        let generation = field.generation;

        if address.trim().is_empty() {
            self.inner.state.send_replace(FeeState::Idle);
            return;
        }
        self.inner.state.send_replace(FeeState::AwaitingEstimate {
            address: address.to_string(),
        });
        drop(field);

        if !self.inner.estimator.is_resolvable(address) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let address = address.to_string();
        tokio::spawn(inner.recalculate(generation, address));
    }

    /// Forget the address and any fee. Results still in flight are dropped.
    pub fn reset(&self) {
        let mut field = self.inner.lock_field();
        field.generation = field.generation.wrapping_add(1);
        field.address.clear();
        self.inner.state.send_replace(FeeState::Idle);
    }

    /// Current fee state.
    #[must_use]
    pub fn state(&self) -> FeeState {
        self.inner.state.borrow().clone()
    }

    /// The fee for the current address, if known.
    #[must_use]
    pub fn quote(&self) -> Option<FeeQuote> {
        self.inner.state.borrow().quote().copied()
    }

    /// Current contents of the address field.
    #[must_use]
    pub fn address(&self) -> String {
        self.inner.lock_field().address.clone()
    }

    /// Watch fee state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeeState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn estimator(&self) -> &FeeEstimator {
        &self.inner.estimator
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use futures::future::BoxFuture;

    use super::*;
    use crate::delivery::resolver::{DistanceResolver, ResolveError, RouteQuery};
    use crate::services::notifications::{NotificationLog, NotificationVariant};

    /// Resolver with a fixed latency and distance per destination.
    #[derive(Default)]
    struct RouteTable {
        routes: HashMap<String, (Duration, f64)>,
        calls: Mutex<Vec<String>>,
    }

    impl RouteTable {
        fn with(mut self, destination: &str, latency_ms: u64, km: f64) -> Self {
            self.routes.insert(
                destination.to_string(),
                (Duration::from_millis(latency_ms), km),
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DistanceResolver for RouteTable {
        fn resolve<'a>(
            &'a self,
            route: &'a RouteQuery,
        ) -> BoxFuture<'a, Result<f64, ResolveError>> {
            self.calls.lock().unwrap().push(route.destination.clone());
            let entry = self.routes.get(&route.destination).copied();
            Box::pin(async move {
                let (latency, km) =
                    entry.ok_or_else(|| ResolveError::Unresolvable("unknown place".into()))?;
                tokio::time::sleep(latency).await;
                Ok(km)
            })
        }
    }

    fn recalculator(table: &Arc<RouteTable>, log: &Arc<NotificationLog>) -> FeeRecalculator {
        let estimator = FeeEstimator::new(Arc::clone(table) as Arc<dyn DistanceResolver>);
        FeeRecalculator::new(
            estimator,
            DEFAULT_DEBOUNCE,
            Arc::clone(log) as Arc<dyn Notifier>,
        )
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_resolve_once() {
        let final_address = "Kariakoo Market, Dar es Salaam";
        let table = Arc::new(RouteTable::default().with(final_address, 50, 10.0));
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);

        for len in [22, 24, 26, 28] {
            recalc.address_changed(&final_address[..len]);
            tokio::time::sleep(ms(150)).await;
        }
        recalc.address_changed(final_address);
        tokio::time::sleep(ms(3_000)).await;

        assert_eq!(table.calls(), [final_address]);
        assert_eq!(recalc.quote().map(|q| q.fee.as_i64()), Some(2_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_result_is_discarded() {
        let slow = "Bagamoyo Road, Tegeta, Dar es Salaam";
        let fast = "Kariakoo Market, Dar es Salaam";
        let table = Arc::new(
            RouteTable::default()
                .with(slow, 5_000, 30.0)
                .with(fast, 100, 10.0),
        );
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);

        recalc.address_changed(slow);
        tokio::time::sleep(ms(1_100)).await;
        assert_eq!(
            recalc.state(),
            FeeState::Estimating {
                address: slow.to_string()
            }
        );

        recalc.address_changed(fast);
        tokio::time::sleep(ms(1_500)).await;
        assert_eq!(recalc.state().address(), Some(fast));
        assert_eq!(recalc.quote().map(|q| q.fee.as_i64()), Some(2_500));

        // Let the slow lookup finish.
        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(table.calls(), [slow, fast]);
        assert_eq!(recalc.state().address(), Some(fast));
        assert_eq!(recalc.quote().map(|q| q.fee.as_i64()), Some(2_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fee_unknown_while_estimating() {
        let first = "Kariakoo Market, Dar es Salaam";
        let second = "Mlimani City, Sam Nujoma Road";
        let table = Arc::new(
            RouteTable::default()
                .with(first, 10, 10.0)
                .with(second, 2_000, 20.0),
        );
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);

        recalc.address_changed(first);
        tokio::time::sleep(ms(2_000)).await;
        assert!(recalc.quote().is_some());

        recalc.address_changed(second);
        assert!(recalc.quote().is_none());
        assert!(matches!(recalc.state(), FeeState::AwaitingEstimate { .. }));

        tokio::time::sleep(ms(1_500)).await;
        assert!(matches!(recalc.state(), FeeState::Estimating { .. }));
        assert!(recalc.quote().is_none());

        tokio::time::sleep(ms(2_000)).await;
        assert_eq!(recalc.quote().map(|q| q.fee.as_i64()), Some(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_address_never_resolves() {
        let table = Arc::new(RouteTable::default());
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);

        recalc.address_changed("Mbezi");
        tokio::time::sleep(ms(5_000)).await;

        assert!(table.calls().is_empty());
        assert_eq!(
            recalc.state(),
            FeeState::AwaitingEstimate {
                address: "Mbezi".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_notifies_and_blocks() {
        let table = Arc::new(RouteTable::default());
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);

        recalc.address_changed("Atlantis, Indian Ocean");
        tokio::time::sleep(ms(2_000)).await;

        assert!(matches!(recalc.state(), FeeState::Failed { .. }));
        assert!(recalc.quote().is_none());

        let notifications = log.drain();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications.first().map(|n| n.variant),
            Some(NotificationVariant::Destructive)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_drops_in_flight_result() {
        let address = "Bagamoyo Road, Tegeta, Dar es Salaam";
        let table = Arc::new(RouteTable::default().with(address, 3_000, 30.0));
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);

        recalc.address_changed(address);
        tokio::time::sleep(ms(1_500)).await;
        recalc.reset();
        tokio::time::sleep(ms(5_000)).await;

        assert_eq!(recalc.state(), FeeState::Idle);
        assert_eq!(table.calls(), [address]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_ready() {
        let address = "Kariakoo Market, Dar es Salaam";
        let table = Arc::new(RouteTable::default().with(address, 100, 10.0));
        let log = Arc::new(NotificationLog::default());
        let recalc = recalculator(&table, &log);
        let mut rx = recalc.subscribe();

        recalc.address_changed(address);
        let state = rx
            .wait_for(|s| matches!(s, FeeState::Ready { .. }))
            .await
            .unwrap()
            .clone();

        assert_eq!(state.address(), Some(address));
    }
}
