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

//! Per-application producer handles with lazy creation and idle eviction.

use crate::broker::{BrokerClientFactory, ProducerClient};
use crate::config::ProducerConfig;
use crate::control_plane::keyed_mutex::KeyedMutex;
use crate::error::{BoxError, ClientRole, GatewayError, ResourceCreationError};
use crate::lifecycle::{LifecycleError, LifecycleHooks, ServiceLifecycle, ServiceState};
use crate::observability::{events, fields};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const COMPONENT: &str = "producer_pool";

/// One started producer client owned by the pool.
pub struct ProducerHandle {
    app: String,
    client: Arc<dyn ProducerClient>,
    lifecycle: ServiceLifecycle,
    last_active_ms: AtomicU64,
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("app", &self.app)
            .finish_non_exhaustive()
    }
}

impl ProducerHandle {
    fn new(app: &str, client: Arc<dyn ProducerClient>, now_ms: u64) -> Self {
        Self {
            app: app.to_string(),
            client,
            lifecycle: ServiceLifecycle::new(),
            last_active_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn client(&self) -> &Arc<dyn ProducerClient> {
        &self.client
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    fn touch(&self, now_ms: u64) {
        self.last_active_ms.fetch_max(now_ms, Ordering::AcqRel);
    }

    fn idle_for(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_active_ms.load(Ordering::Acquire)))
    }

    async fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start(self).await
    }

    async fn stop(&self) {
        self.lifecycle.stop(self).await
    }
}

#[async_trait]
impl LifecycleHooks for ProducerHandle {
    fn name(&self) -> &str {
        "producer"
    }

    async fn do_start(&self) -> Result<(), BoxError> {
        self.client.start().await.map_err(Into::into)
    }

    async fn do_stop(&self) {
        self.client.shutdown().await;
    }
}

type ProducerRegistry = HashMap<String, Arc<ProducerHandle>>;

/// Registry of producer handles keyed by application.
///
/// Lookups are lock-free reads of the current registry snapshot. Creation,
/// eviction and shutdown of one application's handle run under that
/// application's lock and publish a new snapshot.
pub struct ProducerPool {
    factory: Arc<dyn BrokerClientFactory>,
    config: ProducerConfig,
    registry: ArcSwap<ProducerRegistry>,
    locks: KeyedMutex,
    epoch: Instant,
    lifecycle: ServiceLifecycle,
    idle_monitor: Mutex<Option<JoinHandle<()>>>,
    this: Weak<ProducerPool>,
}

impl ProducerPool {
    pub fn new(factory: Arc<dyn BrokerClientFactory>, config: ProducerConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            factory,
            config,
            registry: ArcSwap::from_pointee(ProducerRegistry::new()),
            locks: KeyedMutex::new(),
            epoch: Instant::now(),
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

    pub fn len(&self) -> usize {
        self.registry.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.load().is_empty()
    }

    /// Current handle of `app` without refreshing its activity time.
    pub fn handle(&self, app: &str) -> Option<Arc<ProducerHandle>> {
        self.registry.load().get(app).cloned()
    }

    fn now_ms(&self) -> u64 {
        fields::millis(self.epoch.elapsed())
    }

    /// Returns the started handle of `app`, creating it on first use.
    ///
    /// Still serves after `will_stop` so requests the dispatcher admitted earlier
    /// can drain; refuses once `stop` begins tearing clients down.
    pub async fn get_or_create(&self, app: &str) -> Result<Arc<ProducerHandle>, GatewayError> {
        if !self.lifecycle.is_serving() {
            return Err(GatewayError::NotRunning(COMPONENT));
        }

        if let Some(handle) = self.registry.load().get(app) {
            if handle.is_started() {
                handle.touch(self.now_ms());
                return Ok(handle.clone());
            }
        }

        let _guard = self.locks.lock(app).await;
        if !self.lifecycle.is_serving() {
            return Err(GatewayError::NotRunning(COMPONENT));
        }
        if let Some(handle) = self.registry.load().get(app) {
            handle.touch(self.now_ms());
            return Ok(handle.clone());
        }

        let client = self
            .factory
            .create_producer(app)
            .map_err(|err| creation_error(app, Box::new(err)))?;
        let handle = Arc::new(ProducerHandle::new(app, client, self.now_ms()));

        if let Err(err) = handle.start().await {
            warn!(
                event = events::PRODUCER_CREATE_FAILED,
                component = COMPONENT,
                app,
                err = %err,
                "unable to start producer"
            );
            return Err(creation_error(app, Box::new(err)));
        }

        self.registry.rcu(|current| {
            let mut next = ProducerRegistry::clone(current);
            next.insert(app.to_string(), handle.clone());
            next
        });
        info!(
            event = events::PRODUCER_CREATE,
            component = COMPONENT,
            app,
            "producer created"
        );
        Ok(handle)
    }

    fn remove(&self, app: &str) -> Option<Arc<ProducerHandle>> {
        let removed = self.registry.load().get(app).cloned();
        if removed.is_some() {
            self.registry.rcu(|current| {
                let mut next = ProducerRegistry::clone(current);
                next.remove(app);
                next
            });
        }
        removed
    }

    /// Shuts down every handle idle for longer than the configured maximum.
    pub async fn evict_idle_producers(&self) -> usize {
        let max_idle = self.config.max_idle_time();
        let apps: Vec<String> = self.registry.load().keys().cloned().collect();
        let mut evicted = 0;

        for app in apps {
            let _guard = self.locks.lock(&app).await;
            let Some(handle) = self.handle(&app) else {
                continue;
            };

            let idle = handle.idle_for(self.now_ms());
            if idle <= max_idle {
                continue;
            }

            self.remove(&app);
            handle.stop().await;
            evicted += 1;
            info!(
                event = events::PRODUCER_EVICT_IDLE,
                component = COMPONENT,
                app = app.as_str(),
                elapsed_ms = fields::millis(idle),
                "evicted idle producer"
            );
        }

        evicted
    }

    /// Removes and shuts down every handle regardless of activity.
    pub async fn shutdown_all(&self) {
        let apps: Vec<String> = self.registry.load().keys().cloned().collect();

        for app in apps {
            let _guard = self.locks.lock(&app).await;
            if let Some(handle) = self.remove(&app) {
                handle.stop().await;
                debug!(
                    event = events::PRODUCER_SHUTDOWN,
                    component = COMPONENT,
                    app = app.as_str(),
                    "producer shut down"
                );
            }
        }
    }

    async fn run_idle_monitor(pool: Weak<ProducerPool>, interval: Duration) {
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
            pool.evict_idle_producers().await;
        }

        debug!(
            event = events::PRODUCER_IDLE_MONITOR_EXIT,
            component = COMPONENT,
            reason = fields::REASON_SHUTDOWN_SIGNALED,
            "idle monitor stopped"
        );
    }
}

fn creation_error(app: &str, source: BoxError) -> GatewayError {
    GatewayError::ResourceCreation(ResourceCreationError {
        app: app.to_string(),
        role: ClientRole::Producer,
        source,
    })
}

#[async_trait]
impl LifecycleHooks for ProducerPool {
    fn name(&self) -> &str {
        COMPONENT
    }

    async fn validate(&self) -> Result<(), BoxError> {
        if self.config.idle_check_interval_secs == 0 {
            return Err("producer.idle_check_interval_secs must be greater than zero".into());
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
