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

//! Shared field values and value-format helpers for structured events.

use std::time::Duration;

pub const NONE: &str = "none";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

pub const REASON_CHANNEL_CLOSED: &str = "channel_closed";
pub const REASON_SHUTDOWN_SIGNALED: &str = "shutdown_signaled";
pub const REASON_NO_SUBSCRIPTIONS: &str = "no_subscriptions";
pub const REASON_MISSING_FROM_SNAPSHOT: &str = "missing_from_snapshot";

/// Labels attached to events emitted from a worker thread.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_id: String,
    pub worker_thread: String,
}

impl WorkerContext {
    pub fn new(worker_id: impl Into<String>, worker_thread: Option<&str>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_thread: worker_thread.unwrap_or(DEFAULT_WORKER_THREAD).to_string(),
        }
    }

    pub fn with_current_thread(worker_id: impl Into<String>) -> Self {
        Self::new(worker_id, std::thread::current().name())
    }
}

pub fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or(NONE)
}

pub fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
