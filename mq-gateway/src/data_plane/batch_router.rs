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

//! Splits broker batches by topic and hands each sub-batch to its dispatcher.

use crate::broker::{BatchListener, BrokerMessage};
use crate::data_plane::callback_dispatcher::CallbackDispatcher;
use crate::error::DeliveryError;
use crate::observability::events;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

const COMPONENT: &str = "batch_router";

type DispatcherTable = HashMap<String, Arc<CallbackDispatcher>>;

/// Topic to dispatcher routing table of one consumer handle.
///
/// Reads are lock-free snapshots. Writers are serialized by the consumer pool's
/// per-application lock.
pub struct BatchRouter {
    app: String,
    dispatchers: ArcSwap<DispatcherTable>,
}

impl BatchRouter {
    pub fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            dispatchers: ArcSwap::from_pointee(DispatcherTable::new()),
        }
    }

    /// Installs `dispatcher` for its topic and returns the one it replaced.
    pub fn register(&self, dispatcher: Arc<CallbackDispatcher>) -> Option<Arc<CallbackDispatcher>> {
        let topic = dispatcher.subscription().topic.clone();
        let mut next = DispatcherTable::clone(&self.dispatchers.load());
        let previous = next.insert(topic, dispatcher);
        self.dispatchers.store(Arc::new(next));
        previous
    }

    pub fn unregister(&self, topic: &str) -> Option<Arc<CallbackDispatcher>> {
        let current = self.dispatchers.load();
        if !current.contains_key(topic) {
            return None;
        }
        let mut next = DispatcherTable::clone(&current);
        let removed = next.remove(topic);
        self.dispatchers.store(Arc::new(next));
        removed
    }

    pub fn dispatcher(&self, topic: &str) -> Option<Arc<CallbackDispatcher>> {
        self.dispatchers.load().get(topic).cloned()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.dispatchers.load().keys().cloned().collect();
        topics.sort();
        topics
    }
}

/// Groups messages by topic, keeping first-seen topic order and per-topic
/// message order.
fn group_by_topic(messages: Vec<BrokerMessage>) -> Vec<(String, Vec<BrokerMessage>)> {
    let mut groups: Vec<(String, Vec<BrokerMessage>)> = Vec::new();
    for message in messages {
        match groups.iter_mut().find(|(topic, _)| *topic == message.topic) {
            Some((_, batch)) => batch.push(message),
            None => groups.push((message.topic.clone(), vec![message])),
        }
    }
    groups
}

#[async_trait]
impl BatchListener for BatchRouter {
    async fn on_batch(&self, messages: Vec<BrokerMessage>) -> Result<(), DeliveryError> {
        let dispatchers = self.dispatchers.load_full();
        let mut last_failure = None;

        for (topic, batch) in group_by_topic(messages) {
            let Some(dispatcher) = dispatchers.get(&topic) else {
                error!(
                    event = events::DELIVERY_NO_DISPATCHER,
                    component = COMPONENT,
                    app = self.app.as_str(),
                    topic = topic.as_str(),
                    messages = batch.len(),
                    "no dispatcher registered for delivered topic"
                );
                continue;
            };

            let report = dispatcher.dispatch(&batch).await;
            if let Some(err) = report.last_failure {
                warn!(
                    event = events::DELIVERY_BATCH_FAILED,
                    component = COMPONENT,
                    app = self.app.as_str(),
                    topic = topic.as_str(),
                    delivered = report.delivered,
                    failed = report.failed,
                    err = %err,
                    "sub-batch had failed deliveries"
                );
                last_failure = Some(err);
            }
        }

        match last_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
