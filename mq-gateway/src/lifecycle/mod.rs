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

//! Start/stop state machine shared by every long-lived gateway resource.
//!
//! A resource implements [`LifecycleHooks`] for the transitions it cares about and
//! owns a [`ServiceLifecycle`] that drives those hooks in a fixed order:
//!
//! ```text
//! start: validate -> WillStart -> before_start -> [lock] Starting -> do_start
//!        -> after_start -> Started
//!        (any failure) -> StartFailed -> on_start_error -> stop
//! stop:  WillStop (signal) -> before_stop -> [lock] Stopping -> do_stop
//!        -> after_stop -> Stopped
//! ```
//!
//! State reads are lock-free; `start` and `stop` serialize on one mutex per resource.

use crate::error::BoxError;
use crate::observability::events;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

const COMPONENT: &str = "lifecycle";

/// Lifecycle state of one managed resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ServiceState {
    NotStarted = 0,
    WillStart = 1,
    Starting = 2,
    StartFailed = 3,
    Started = 4,
    WillStop = 5,
    Stopping = 6,
    Stopped = 7,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ServiceState::WillStart,
            2 => ServiceState::Starting,
            3 => ServiceState::StartFailed,
            4 => ServiceState::Started,
            5 => ServiceState::WillStop,
            6 => ServiceState::Stopping,
            7 => ServiceState::Stopped,
            _ => ServiceState::NotStarted,
        }
    }

    fn is_shutting_down(self) -> bool {
        matches!(
            self,
            ServiceState::WillStop | ServiceState::Stopping | ServiceState::Stopped
        )
    }
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ServiceState::NotStarted => "not-started",
            ServiceState::WillStart => "will-start",
            ServiceState::Starting => "starting",
            ServiceState::StartFailed => "start-failed",
            ServiceState::Started => "started",
            ServiceState::WillStop => "will-stop",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{name} failed validation: {source}")]
    Invalid {
        name: String,
        #[source]
        source: BoxError,
    },
    #[error("{name} failed to start: {source}")]
    StartFailed {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Transition hooks. Every hook defaults to a no-op.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Label used in lifecycle log records.
    fn name(&self) -> &str;

    async fn validate(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn before_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn do_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn after_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_start_error(&self, _err: &BoxError) {}

    async fn before_stop(&self) {}

    async fn do_stop(&self) {}

    async fn after_stop(&self) {}
}

/// Receiver side of a resource's shutdown signal.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_signaled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Sleeps up to `timeout`; returns `true` as soon as shutdown is signaled.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if self.is_signaled() {
            return true;
        }
        match tokio::time::timeout(timeout, self.receiver.wait_for(|stop| *stop)).await {
            Ok(_) => true,
            Err(_) => false,
        }
    }
}

/// Drives [`LifecycleHooks`] for one resource and tracks its state.
pub struct ServiceLifecycle {
    state: AtomicU8,
    started: AtomicBool,
    mutex: Mutex<()>,
    signal: watch::Sender<bool>,
}

impl Default for ServiceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceLifecycle {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(ServiceState::NotStarted as u8),
            started: AtomicBool::new(false),
            mutex: Mutex::new(()),
            signal,
        }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// True only while started and not asked to stop.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.state().is_shutting_down()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Started
    }

    /// Started, or asked to stop but not yet tearing down. Work admitted before
    /// `will_stop` may still complete in this window.
    pub fn is_serving(&self) -> bool {
        matches!(self.state(), ServiceState::Started | ServiceState::WillStop)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state(), ServiceState::StartFailed) || self.state().is_shutting_down()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.signal.subscribe(),
        }
    }

    /// Waits for the shutdown signal or `timeout`; returns at once when not started.
    pub async fn await_shutdown(&self, timeout: Duration) {
        if !self.is_started() {
            return;
        }
        self.shutdown_signal().wait_timeout(timeout).await;
    }

    /// Starts the resource. Starting an already started resource is a no-op.
    pub async fn start<H>(&self, hooks: &H) -> Result<(), LifecycleError>
    where
        H: LifecycleHooks + ?Sized,
    {
        if self.is_ready() {
            return Ok(());
        }

        hooks
            .validate()
            .await
            .map_err(|source| LifecycleError::Invalid {
                name: hooks.name().to_string(),
                source,
            })?;

        self.set_state(ServiceState::WillStart);
        if let Err(source) = hooks.before_start().await {
            self.set_state(ServiceState::StartFailed);
            return Err(self.start_failed(hooks, source));
        }

        let _guard = self.mutex.lock().await;
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if !self.state().is_shutting_down() {
                self.set_state(ServiceState::Started);
            }
            return Ok(());
        }

        self.signal.send_replace(false);
        self.set_state(ServiceState::Starting);

        let started = match hooks.do_start().await {
            Ok(()) => hooks.after_start().await,
            Err(err) => Err(err),
        };

        match started {
            Ok(()) => {
                self.set_state(ServiceState::Started);
                info!(
                    event = events::LIFECYCLE_START_OK,
                    component = COMPONENT,
                    resource = hooks.name(),
                    "resource started"
                );
                Ok(())
            }
            Err(source) => {
                self.set_state(ServiceState::StartFailed);
                hooks.on_start_error(&source).await;
                self.begin_stop(hooks, ServiceState::StartFailed).await;
                self.finish_stop(hooks).await;
                Err(self.start_failed(hooks, source))
            }
        }
    }

    fn start_failed<H>(&self, hooks: &H, source: BoxError) -> LifecycleError
    where
        H: LifecycleHooks + ?Sized,
    {
        warn!(
            event = events::LIFECYCLE_START_FAILED,
            component = COMPONENT,
            resource = hooks.name(),
            err = %source,
            "resource failed to start"
        );
        LifecycleError::StartFailed {
            name: hooks.name().to_string(),
            source,
        }
    }

    /// Signals waiters and runs `before_stop` without tearing anything down.
    pub async fn will_stop<H>(&self, hooks: &H)
    where
        H: LifecycleHooks + ?Sized,
    {
        let previous = self.state();
        if matches!(previous, ServiceState::Stopped | ServiceState::WillStop) {
            return;
        }
        self.begin_stop(hooks, previous).await;
    }

    /// Stops the resource. Idempotent once stopped.
    pub async fn stop<H>(&self, hooks: &H)
    where
        H: LifecycleHooks + ?Sized,
    {
        let previous = self.state();
        if previous == ServiceState::Stopped {
            return;
        }
        if previous != ServiceState::WillStop {
            self.begin_stop(hooks, previous).await;
        }

        let _guard = self.mutex.lock().await;
        self.finish_stop(hooks).await;
    }

    async fn begin_stop<H>(&self, hooks: &H, previous: ServiceState)
    where
        H: LifecycleHooks + ?Sized,
    {
        self.set_state(ServiceState::WillStop);
        self.signal.send_replace(true);
        debug!(
            event = events::LIFECYCLE_WILL_STOP,
            component = COMPONENT,
            resource = hooks.name(),
            previous = %previous,
            "resource asked to stop"
        );
        hooks.before_stop().await;
    }

    // Caller holds `self.mutex`.
    async fn finish_stop<H>(&self, hooks: &H)
    where
        H: LifecycleHooks + ?Sized,
    {
        if self
            .started
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.set_state(ServiceState::Stopping);
            hooks.do_stop().await;
            hooks.after_stop().await;
            info!(
                event = events::LIFECYCLE_STOP_OK,
                component = COMPONENT,
                resource = hooks.name(),
                "resource stopped"
            );
        }
        self.set_state(ServiceState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::{LifecycleError, LifecycleHooks, ServiceLifecycle, ServiceState};
    use crate::error::BoxError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHooks {
        calls: Mutex<Vec<&'static str>>,
        fail_do_start: AtomicBool,
    }

    impl RecordingHooks {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LifecycleHooks for RecordingHooks {
        fn name(&self) -> &str {
            "recording"
        }

        async fn validate(&self) -> Result<(), BoxError> {
            self.record("validate");
            Ok(())
        }

        async fn before_start(&self) -> Result<(), BoxError> {
            self.record("before_start");
            Ok(())
        }

        async fn do_start(&self) -> Result<(), BoxError> {
            self.record("do_start");
            if self.fail_do_start.load(Ordering::SeqCst) {
                return Err("boom".into());
            }
            Ok(())
        }

        async fn after_start(&self) -> Result<(), BoxError> {
            self.record("after_start");
            Ok(())
        }

        async fn on_start_error(&self, _err: &BoxError) {
            self.record("on_start_error");
        }

        async fn before_stop(&self) {
            self.record("before_stop");
        }

        async fn do_stop(&self) {
            self.record("do_stop");
        }

        async fn after_stop(&self) {
            self.record("after_stop");
        }
    }

    #[tokio::test]
    async fn start_then_stop_runs_hooks_in_order() {
        let lifecycle = ServiceLifecycle::new();
        let hooks = RecordingHooks::default();
        assert_eq!(lifecycle.state(), ServiceState::NotStarted);
        assert!(!lifecycle.is_stopped());

        lifecycle.start(&hooks).await.unwrap();
        assert!(lifecycle.is_started());
        assert!(lifecycle.is_ready());

        lifecycle.stop(&hooks).await;
        assert_eq!(lifecycle.state(), ServiceState::Stopped);
        assert!(!lifecycle.is_started());
        assert!(lifecycle.is_stopped());
        assert_eq!(
            hooks.calls(),
            vec![
                "validate",
                "before_start",
                "do_start",
                "after_start",
                "before_stop",
                "do_stop",
                "after_stop"
            ]
        );
    }

    #[tokio::test]
    async fn start_is_noop_when_already_started_and_stop_is_idempotent() {
        let lifecycle = ServiceLifecycle::new();
        let hooks = RecordingHooks::default();

        lifecycle.start(&hooks).await.unwrap();
        lifecycle.start(&hooks).await.unwrap();
        let do_starts = hooks.calls().iter().filter(|c| **c == "do_start").count();
        assert_eq!(do_starts, 1);

        lifecycle.stop(&hooks).await;
        lifecycle.stop(&hooks).await;
        let do_stops = hooks.calls().iter().filter(|c| **c == "do_stop").count();
        assert_eq!(do_stops, 1);
    }

    #[tokio::test]
    async fn failed_start_reports_error_and_stops() {
        let lifecycle = ServiceLifecycle::new();
        let hooks = RecordingHooks::default();
        hooks.fail_do_start.store(true, Ordering::SeqCst);

        let err = lifecycle.start(&hooks).await.unwrap_err();
        assert!(matches!(err, LifecycleError::StartFailed { .. }));
        assert_eq!(lifecycle.state(), ServiceState::Stopped);
        assert!(!lifecycle.is_started());
        assert_eq!(
            hooks.calls(),
            vec![
                "validate",
                "before_start",
                "do_start",
                "on_start_error",
                "before_stop",
                "do_stop",
                "after_stop"
            ]
        );

        hooks.fail_do_start.store(false, Ordering::SeqCst);
        lifecycle.start(&hooks).await.unwrap();
        assert!(lifecycle.is_ready());
    }

    #[tokio::test]
    async fn will_stop_forces_not_started_and_wakes_waiters() {
        let lifecycle = Arc::new(ServiceLifecycle::new());
        let hooks = RecordingHooks::default();
        lifecycle.start(&hooks).await.unwrap();

        let mut signal = lifecycle.shutdown_signal();
        let waiter = tokio::spawn(async move { signal.wait_timeout(Duration::from_secs(60)).await });

        lifecycle.will_stop(&hooks).await;
        assert_eq!(lifecycle.state(), ServiceState::WillStop);
        assert!(!lifecycle.is_started());
        assert!(!lifecycle.is_ready());
        assert!(lifecycle.is_serving());
        assert!(lifecycle.is_stopped());
        assert!(waiter.await.unwrap());

        lifecycle.stop(&hooks).await;
        assert!(!lifecycle.is_serving());
        let before_stops = hooks.calls().iter().filter(|c| **c == "before_stop").count();
        assert_eq!(before_stops, 1);
        assert_eq!(lifecycle.state(), ServiceState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_returns_false_on_timer_expiry() {
        let lifecycle = ServiceLifecycle::new();
        let hooks = RecordingHooks::default();
        lifecycle.start(&hooks).await.unwrap();

        let mut signal = lifecycle.shutdown_signal();
        assert!(!signal.wait_timeout(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn await_shutdown_returns_immediately_when_not_started() {
        let lifecycle = ServiceLifecycle::new();
        tokio::time::timeout(
            Duration::from_millis(100),
            lifecycle.await_shutdown(Duration::from_secs(3600)),
        )
        .await
        .expect("await_shutdown should not block");
    }
}
