/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Periodic and on-demand subscription synchronization.

use crate::control_plane::consumer_pool::{ConsumerPool, ReconcileSummary};
use crate::error::{BoxError, ProviderError};
use crate::lifecycle::{LifecycleError, LifecycleHooks, ServiceLifecycle, ServiceState};
use crate::observability::{events, fields};
use crate::routing::allow_list::PublishAllowList;
use crate::routing::subscription::{group_by_app, Subscription};
use crate::subscription_sync_health::SubscriptionSyncHealth;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMPONENT: &str = "subscription_sync";

/// Source of the complete desired-subscription snapshots.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// `(app, topic)` pairs allowed to publish.
    async fn producer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError>;

    /// Consumer subscriptions with their tag and callback.
    async fn consumer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError>;
}

/// Pulls snapshots from a [`SubscriptionProvider`] and applies them to the
/// publish allow-list and the consumer pool.
pub struct SubscriptionSync {
    provider: Arc<dyn SubscriptionProvider>,
    allow_list: Arc<PublishAllowList>,
    consumers: Arc<ConsumerPool>,
    refresh_interval: Duration,
    refresh: Notify,
    pass: AsyncMutex<()>,
    health: Mutex<SubscriptionSyncHealth>,
    lifecycle: ServiceLifecycle,
    sync_loop: Mutex<Option<JoinHandle<()>>>,
    this: Weak<SubscriptionSync>,
}

impl SubscriptionSync {
    pub fn new(
        provider: Arc<dyn SubscriptionProvider>,
        allow_list: Arc<PublishAllowList>,
        consumers: Arc<ConsumerPool>,
        refresh_interval: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            provider,
            allow_list,
            consumers,
            refresh_interval,
            refresh: Notify::new(),
            pass: AsyncMutex::new(()),
            health: Mutex::new(SubscriptionSyncHealth::default()),
            lifecycle: ServiceLifecycle::new(),
            sync_loop: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start(self).await
    }

    pub async fn will_stop(&self) {
        self.lifecycle.will_stop(self).await
    }

    pub async fn stop(&self) {
        self.lifecycle.stop(self).await
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    pub fn health(&self) -> SubscriptionSyncHealth {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wakes the sync loop for an immediate pass.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Fetches both snapshots and applies them. On provider failure the
    /// previously applied sets stay in place.
    pub async fn sync_once(&self) -> Result<ReconcileSummary, ProviderError> {
        let _pass = self.pass.lock().await;
        let attempt_at = SystemTime::now();

        let fetched = match self.provider.producer_subscriptions().await {
            Ok(producers) => self
                .provider
                .consumer_subscriptions()
                .await
                .map(|consumers| (producers, consumers)),
            Err(err) => Err(err),
        };

        let (producers, consumers) = match fetched {
            Ok(snapshots) => snapshots,
            Err(err) => {
                self.record_attempt(attempt_at, false);
                warn!(
                    event = events::SUBSCRIPTION_SYNC_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "subscription fetch failed, keeping previous sets"
                );
                return Err(err);
            }
        };

        let allowed = self.allow_list.replace(&producers);
        let summary = self.consumers.on_subscription(&group_by_app(consumers)).await;
        self.record_attempt(attempt_at, true);
        info!(
            event = events::SUBSCRIPTION_SYNC_OK,
            component = COMPONENT,
            allowed,
            reconciled = summary.reconciled,
            removed = summary.removed,
            "subscriptions synchronized"
        );
        Ok(summary)
    }

    fn record_attempt(&self, at: SystemTime, succeeded: bool) {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_attempt(at, succeeded);
    }

    async fn run_sync_loop(sync: Weak<SubscriptionSync>, interval: Duration) {
        let Some(mut signal) = sync.upgrade().map(|sync| sync.lifecycle.shutdown_signal()) else {
            return;
        };

        loop {
            let stopped = {
                let Some(current) = sync.upgrade() else {
                    break;
                };
                tokio::select! {
                    stopped = signal.wait_timeout(interval) => stopped,
                    _ = current.refresh.notified() => false,
                }
            };
            if stopped {
                break;
            }
            let Some(current) = sync.upgrade() else {
                break;
            };
            let _ = current.sync_once().await;
        }

        debug!(
            event = events::SUBSCRIPTION_SYNC_LOOP_EXIT,
            component = COMPONENT,
            reason = fields::REASON_SHUTDOWN_SIGNALED,
            "subscription sync loop stopped"
        );
    }
}

#[async_trait]
impl LifecycleHooks for SubscriptionSync {
    fn name(&self) -> &str {
        COMPONENT
    }

    async fn validate(&self) -> Result<(), BoxError> {
        if self.refresh_interval.is_zero() {
            return Err("subscription.refresh_interval_secs must be greater than zero".into());
        }
        Ok(())
    }

    async fn do_start(&self) -> Result<(), BoxError> {
        // A failed first pass is retried by the loop.
        let _ = self.sync_once().await;

        let sync_loop = tokio::spawn(Self::run_sync_loop(self.this.clone(), self.refresh_interval));
        let previous = self
            .sync_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(sync_loop);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn do_stop(&self) {
        let sync_loop = self
            .sync_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sync_loop) = sync_loop {
            let _ = sync_loop.await;
        }
    }
}
