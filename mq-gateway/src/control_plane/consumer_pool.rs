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

//! Per-application consumer handles driven by reconciliation passes.

use crate::broker::BrokerClientFactory;
use crate::callback::CallbackTransport;
use crate::config::ConsumerConfig;
use crate::control_plane::consumer_handle::ConsumerHandle;
use crate::control_plane::keyed_mutex::KeyedMutex;
use crate::error::{BoxError, ClientRole, GatewayError, ResourceCreationError};
use crate::lifecycle::{LifecycleError, LifecycleHooks, ServiceLifecycle, ServiceState};
use crate::observability::{events, fields};
use crate::routing::reconciler::{diff, SubscriptionDelta};
use crate::routing::subscription::{DesiredSubscriptions, Subscription};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "consumer_pool";

/// Result of reconciling one application.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub delta: SubscriptionDelta,
    /// Subscribe/unsubscribe calls that failed and were skipped.
    pub failures: usize,
    /// The app had no desired topics and its handle was removed.
    pub removed: bool,
}

/// Totals of one full reconciliation pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileSummary {
    pub reconciled: usize,
    pub removed: usize,
    pub failed_apps: usize,
    pub failed_operations: usize,
}

type ConsumerRegistry = HashMap<String, Arc<ConsumerHandle>>;

/// Registry of consumer handles keyed by application.
pub struct ConsumerPool {
    factory: Arc<dyn BrokerClientFactory>,
    transport: Arc<dyn CallbackTransport>,
    gateway_address: String,
    config: ConsumerConfig,
    registry: ArcSwap<ConsumerRegistry>,
    locks: KeyedMutex,
    lifecycle: ServiceLifecycle,
    idle_monitor: Mutex<Option<JoinHandle<()>>>,
    this: Weak<ConsumerPool>,
}

impl ConsumerPool {
    pub fn new(
        factory: Arc<dyn BrokerClientFactory>,
        transport: Arc<dyn CallbackTransport>,
        gateway_address: &str,
        config: ConsumerConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            factory,
            transport,
            gateway_address: gateway_address.to_string(),
            config,
            registry: ArcSwap::from_pointee(ConsumerRegistry::new()),
            locks: KeyedMutex::new(),
            lifecycle: ServiceLifecycle::new(),
            idle_monitor: Mutex::new(None),
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

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    pub fn handle(&self, app: &str) -> Option<Arc<ConsumerHandle>> {
        self.registry.load().get(app).cloned()
    }

    pub fn apps(&self) -> Vec<String> {
        let mut apps: Vec<String> = self.registry.load().keys().cloned().collect();
        apps.sort();
        apps
    }

    pub fn len(&self) -> usize {
        self.registry.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.load().is_empty()
    }

    fn insert(&self, app: &str, handle: Arc<ConsumerHandle>) {
        self.registry.rcu(|current| {
            let mut next = ConsumerRegistry::clone(current);
            next.insert(app.to_string(), handle.clone());
            next
        });
    }

    fn remove(&self, app: &str) -> Option<Arc<ConsumerHandle>> {
        let removed = self.handle(app);
        if removed.is_some() {
            self.registry.rcu(|current| {
                let mut next = ConsumerRegistry::clone(current);
                next.remove(app);
                next
            });
        }
        removed
    }

    /// Applies a full desired snapshot: every listed app is reconciled, every
    /// registered app missing from the snapshot is stopped and removed.
    pub async fn on_subscription(&self, desired: &DesiredSubscriptions) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for (app, subscriptions) in desired {
            match self.reconcile(app, subscriptions).await {
                Ok(outcome) => {
                    summary.reconciled += 1;
                    summary.failed_operations += outcome.failures;
                    if outcome.removed {
                        summary.removed += 1;
                    }
                }
                Err(err) => {
                    summary.failed_apps += 1;
                    error!(
                        event = events::CONSUMER_CREATE_FAILED,
                        component = COMPONENT,
                        app = app.as_str(),
                        err = %err,
                        "unable to reconcile consumer"
                    );
                }
            }
        }

        let stale: Vec<String> = self
            .apps()
            .into_iter()
            .filter(|app| !desired.contains_key(app))
            .collect();
        for app in stale {
            if self
                .remove_app(&app, fields::REASON_MISSING_FROM_SNAPSHOT)
                .await
            {
                summary.removed += 1;
            }
        }

        info!(
            event = events::CONSUMER_RECONCILE_SUMMARY,
            component = COMPONENT,
            reconciled = summary.reconciled,
            removed = summary.removed,
            failed_apps = summary.failed_apps,
            failed_operations = summary.failed_operations,
            "consumer reconciliation pass finished"
        );
        summary
    }

    /// Converges `app`'s live subscriptions to `desired`.
    ///
    /// Changed topics are unsubscribed then resubscribed, then additions and
    /// removals are applied. A failing call is logged and leaves that one topic
    /// as it was. An empty `desired` stops and removes the app's handle.
    pub async fn reconcile(
        &self,
        app: &str,
        desired: &[Subscription],
    ) -> Result<ReconcileOutcome, GatewayError> {
        if !self.lifecycle.is_ready() {
            return Err(GatewayError::NotRunning(COMPONENT));
        }

        if desired.is_empty() {
            let removed = self.remove_app(app, fields::REASON_NO_SUBSCRIPTIONS).await;
            return Ok(ReconcileOutcome {
                removed,
                ..ReconcileOutcome::default()
            });
        }

        let _guard = self.locks.lock(app).await;

        let (handle, created) = match self.handle(app) {
            Some(handle) => (handle, false),
            None => {
                let client = self
                    .factory
                    .create_consumer(app)
                    .map_err(|err| creation_error(app, Box::new(err)))?;
                let handle = Arc::new(ConsumerHandle::new(
                    app,
                    client,
                    self.transport.clone(),
                    &self.gateway_address,
                ));
                info!(
                    event = events::CONSUMER_CREATE,
                    component = COMPONENT,
                    app,
                    "consumer created"
                );
                (handle, true)
            }
        };

        let delta = diff(&handle.active_subscriptions(), desired);
        let mut failures = 0;

        for (old, new) in &delta.changed {
            if let Err(err) = handle.unsubscribe(old).await {
                failures += 1;
                log_unsubscribe_failure(old, &err);
                continue;
            }
            if let Err(err) = handle.subscribe(new).await {
                failures += 1;
                log_subscribe_failure(new, &err);
            }
        }
        for subscription in &delta.added {
            if let Err(err) = handle.subscribe(subscription).await {
                failures += 1;
                log_subscribe_failure(subscription, &err);
            }
        }
        for subscription in &delta.removed {
            if let Err(err) = handle.unsubscribe(subscription).await {
                failures += 1;
                log_unsubscribe_failure(subscription, &err);
            }
        }

        if !handle.is_started() {
            if let Err(err) = handle.start().await {
                warn!(
                    event = events::CONSUMER_START_FAILED,
                    component = COMPONENT,
                    app,
                    err = %err,
                    "unable to start consumer"
                );
                if !created {
                    self.remove(app);
                }
                return Err(creation_error(app, Box::new(err)));
            }
        }

        if created {
            self.insert(app, handle);
        }

        Ok(ReconcileOutcome {
            delta,
            failures,
            removed: false,
        })
    }

    /// Stops and removes `app`'s handle. Returns whether one existed.
    pub async fn remove_app(&self, app: &str, reason: &str) -> bool {
        let _guard = self.locks.lock(app).await;
        let Some(handle) = self.remove(app) else {
            return false;
        };
        handle.stop().await;
        info!(
            event = events::CONSUMER_REMOVE,
            component = COMPONENT,
            app,
            reason,
            "consumer removed"
        );
        true
    }

    /// Stops handles that were left without any live subscription.
    pub async fn evict_idle_consumers(&self) -> usize {
        let mut evicted = 0;

        for app in self.apps() {
            let _guard = self.locks.lock(&app).await;
            let Some(handle) = self.handle(&app) else {
                continue;
            };
            if handle.active_count() > 0 {
                continue;
            }

            self.remove(&app);
            handle.stop().await;
            evicted += 1;
            info!(
                event = events::CONSUMER_EVICT_IDLE,
                component = COMPONENT,
                app = app.as_str(),
                reason = fields::REASON_NO_SUBSCRIPTIONS,
                "evicted consumer without subscriptions"
            );
        }

        evicted
    }

    /// Stops every handle and empties the registry.
    pub async fn shutdown_all(&self) {
        for app in self.apps() {
            let _guard = self.locks.lock(&app).await;
            if let Some(handle) = self.remove(&app) {
                handle.stop().await;
                debug!(
                    event = events::CONSUMER_SHUTDOWN,
                    component = COMPONENT,
                    app = app.as_str(),
                    "consumer shut down"
                );
            }
        }
    }

    async fn run_idle_monitor(pool: Weak<ConsumerPool>, interval: Duration) {
        let Some(mut signal) = pool.upgrade().map(|pool| pool.lifecycle.shutdown_signal()) else {
            return;
        };

        loop {
            if signal.wait_timeout(interval).await {
                break;
            }
            let Some(pool) = pool.upgrade() else {
                break;
            };
            pool.evict_idle_consumers().await;
        }

        debug!(
            event = events::CONSUMER_IDLE_MONITOR_EXIT,
            component = COMPONENT,
            reason = fields::REASON_SHUTDOWN_SIGNALED,
            "idle monitor stopped"
        );
    }
}

fn creation_error(app: &str, source: BoxError) -> GatewayError {
    GatewayError::ResourceCreation(ResourceCreationError {
        app: app.to_string(),
        role: ClientRole::Consumer,
        source,
    })
}

fn log_subscribe_failure(subscription: &Subscription, err: &dyn std::error::Error) {
    error!(
        event = events::CONSUMER_SUBSCRIBE_FAILED,
        component = COMPONENT,
        app = subscription.app.as_str(),
        topic = subscription.topic.as_str(),
        tag = subscription.tag.as_str(),
        callback = subscription.callback.as_str(),
        err = %err,
        "subscribe failed"
    );
}

fn log_unsubscribe_failure(subscription: &Subscription, err: &dyn std::error::Error) {
    error!(
        event = events::CONSUMER_UNSUBSCRIBE_FAILED,
        component = COMPONENT,
        app = subscription.app.as_str(),
        topic = subscription.topic.as_str(),
        err = %err,
        "unsubscribe failed"
    );
}

#[async_trait]
impl LifecycleHooks for ConsumerPool {
    fn name(&self) -> &str {
        COMPONENT
    }

    async fn validate(&self) -> Result<(), BoxError> {
        if self.config.idle_check_interval_secs == 0 {
            return Err("consumer.idle_check_interval_secs must be greater than zero".into());
        }
        Ok(())
    }

    async fn do_start(&self) -> Result<(), BoxError> {
        let monitor = tokio::spawn(Self::run_idle_monitor(
            self.this.clone(),
            self.config.idle_check_interval(),
        ));
        let previous = self
            .idle_monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(monitor);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn do_stop(&self) {
        let monitor = self
            .idle_monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }
        self.shutdown_all().await;
    }
}
