//! The dispatch loop.
//!
//! Subscribers and their listings are processed strictly one after another:
//! the gate's read-modify-write on a listing is not atomic, so only one
//! admit may be in flight at any time. Deliveries are the exception. They
//! run as separate tasks and report back here, where their side effects are
//! applied on the same sequential path.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;
use uuid::Uuid;

use crate::admission::AdmissionGate;
use crate::errors::{AppError, ResultExt};
use crate::feed_client::FeedClient;
use crate::models::Subscriber;
use crate::notifier::{completion_effect, DeliveryOutcome, Notifier, SideEffect};
use crate::store::SessionStore;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub subscribers: usize,
    pub listings: usize,
    pub notifications: usize,
    pub delivered: usize,
    pub permanent_failures: usize,
    pub transient_failures: usize,
}

#[derive(Debug)]
struct DeliveryReport {
    subscriber_key: String,
    recipient_id: String,
    listing_id: String,
    outcome: DeliveryOutcome,
}

#[derive(Default)]
struct RunState {
    summary: RunSummary,
    deliveries: JoinSet<DeliveryReport>,
    /// Sessions unsubscribed during this run.
    unsubscribed: HashSet<String>,
}

pub struct Dispatcher {
    sessions: Arc<dyn SessionStore>,
    feed: FeedClient,
    gate: AdmissionGate,
    notifier: Notifier,
    run_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        feed: FeedClient,
        gate: AdmissionGate,
        notifier: Notifier,
    ) -> Self {
        Self {
            sessions,
            feed,
            gate,
            notifier,
            run_lock: Mutex::new(()),
        }
    }

    /// Runs once, waiting for a run in progress to finish first.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let _guard = self.run_lock.lock().await;
        self.run_exclusive().await
    }

    /// Runs once, or fails with `Conflict` if a run is in progress.
    pub async fn try_run(&self) -> Result<RunSummary, AppError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| AppError::Conflict("A dispatch run is already in progress".to_string()))?;
        self.run_exclusive().await
    }

    async fn run_exclusive(&self) -> Result<RunSummary, AppError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("dispatch_run", %run_id);

        async move {
            let subscribers = self
                .sessions
                .active_subscribers()
                .await
                .context("loading subscribers")?;
            tracing::info!("Dispatch run started for {} subscribers", subscribers.len());

            let mut state = RunState::default();
            for subscriber in &subscribers {
                self.process_subscriber(subscriber, &mut state).await;
            }

            while let Some(joined) = state.deliveries.join_next().await {
                self.apply_report(joined, &mut state).await;
            }

            let summary = state.summary;
            tracing::info!(
                "Dispatch run finished: {} subscribers, {} listings, {} notifications ({} delivered, {} unreachable, {} failed)",
                summary.subscribers,
                summary.listings,
                summary.notifications,
                summary.delivered,
                summary.permanent_failures,
                summary.transient_failures
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn process_subscriber(&self, subscriber: &Subscriber, state: &mut RunState) {
        let Some(search_url) = subscriber.search_url.as_deref() else {
            return;
        };
        state.summary.subscribers += 1;

        let listings = self.feed.fetch(search_url).await;
        if listings.is_empty() {
            tracing::debug!("No apartments for {}", subscriber.key);
            return;
        }

        let recipient_id = subscriber.recipient_id().to_string();
        for listing in listings {
            self.drain_completed(state).await;
            if state.unsubscribed.contains(&subscriber.key) {
                tracing::info!(
                    "{} unsubscribed during this run, skipping remaining apartments",
                    subscriber.key
                );
                break;
            }

            state.summary.listings += 1;
            let listing_id = listing.external_id.clone();
            let admission = match self.gate.admit(listing, &recipient_id).await {
                Ok(admission) => admission,
                Err(e) => {
                    tracing::error!(
                        "Can't process apartment {} for '{}': {}",
                        listing_id,
                        subscriber.key,
                        e
                    );
                    continue;
                }
            };

            if !admission.should_notify {
                continue;
            }

            state.summary.notifications += 1;
            let notifier = self.notifier.clone();
            let subscriber_key = subscriber.key.clone();
            let recipient_id = recipient_id.clone();
            state.deliveries.spawn(async move {
                let outcome = notifier.notify(&recipient_id, &admission.listing).await;
                DeliveryReport {
                    subscriber_key,
                    recipient_id,
                    listing_id: admission.listing.external_id,
                    outcome,
                }
            });
        }
    }

    /// Applies the reports of deliveries that have finished so far.
    ///
    /// Yields first so in-flight deliveries get polled even when the admit
    /// path never suspends.
    async fn drain_completed(&self, state: &mut RunState) {
        if state.deliveries.is_empty() {
            return;
        }
        tokio::task::yield_now().await;
        while let Some(joined) = state.deliveries.try_join_next() {
            self.apply_report(joined, state).await;
        }
    }

    async fn apply_report(
        &self,
        joined: Result<DeliveryReport, JoinError>,
        state: &mut RunState,
    ) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Delivery task failed: {}", e);
                state.summary.transient_failures += 1;
                return;
            }
        };

        match completion_effect(&report.outcome) {
            SideEffect::None => state.summary.delivered += 1,
            SideEffect::Unsubscribe => {
                state.summary.permanent_failures += 1;
                if !state.unsubscribed.insert(report.subscriber_key.clone()) {
                    return;
                }
                match self.sessions.clear_search_url(&report.subscriber_key).await {
                    Ok(()) => tracing::info!(
                        "Unsubscribed '{}': chat {} is unreachable",
                        report.subscriber_key,
                        report.recipient_id
                    ),
                    Err(e) => tracing::error!(
                        "Failed to unsubscribe '{}': {}",
                        report.subscriber_key,
                        e
                    ),
                }
            }
            SideEffect::Log(reason) => {
                state.summary.transient_failures += 1;
                tracing::error!(
                    "Can't send the apartment {} to the user '{}': {}",
                    report.listing_id,
                    report.subscriber_key,
                    reason
                );
            }
        }
    }
}
