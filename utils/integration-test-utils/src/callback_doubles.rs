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

use async_trait::async_trait;
use mq_gateway::callback::{CallbackRequest, CallbackTransport};
use mq_gateway::error::CallbackError;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Records every callback POST and acknowledges it, except for scripted failures.
pub struct RecordingCallbackTransport {
    requests: Mutex<Vec<CallbackRequest>>,
    failing_calls: Mutex<HashSet<usize>>,
    reply: String,
}

impl Default for RecordingCallbackTransport {
    fn default() -> Self {
        Self::with_reply("ok")
    }
}

impl RecordingCallbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call with `reply`; a blank reply counts as no acknowledgment.
    pub fn with_reply(reply: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failing_calls: Mutex::new(HashSet::new()),
            reply: reply.to_string(),
        }
    }

    /// Makes the `call`-th POST (1-based, counted across all callbacks) fail with HTTP 500.
    pub fn fail_call(&self, call: usize) {
        self.failing_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(call);
    }

    pub fn requests(&self) -> Vec<CallbackRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CallbackTransport for RecordingCallbackTransport {
    async fn post(&self, request: CallbackRequest) -> Result<String, CallbackError> {
        let call = {
            let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
            requests.push(request.clone());
            requests.len()
        };
        debug!("callback call {call} to {}", request.url);

        let failing = self
            .failing_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&call);
        if failing {
            return Err(CallbackError::Status(500));
        }
        Ok(self.reply.clone())
    }
}
