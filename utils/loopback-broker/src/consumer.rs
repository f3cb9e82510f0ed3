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

use crate::{COMPONENT, DELIVERY_ATTEMPTS};
use async_trait::async_trait;
use mq_gateway::broker::{BatchListener, BrokerMessage, ConsumerClient};
use mq_gateway::error::BrokerError;
use mq_gateway::routing::subscription::TagExpression;
use std::collections::BTreeMap;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Listener of a started consumer and the runtime its deliveries run on.
struct Started {
    listener: Arc<dyn BatchListener>,
    runtime: Handle,
}

/// Consumer client bound to one application.
///
/// Deliveries run on the runtime that called `start`, never on the publisher's.
pub struct LoopbackConsumer {
    app: String,
    subscriptions: Mutex<BTreeMap<String, TagExpression>>,
    started: Mutex<Option<Started>>,
    deliveries: Mutex<Vec<JoinHandle<()>>>,
}

impl LoopbackConsumer {
    pub(crate) fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            subscriptions: Mutex::new(BTreeMap::new()),
            started: Mutex::new(None),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn is_started(&self) -> bool {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribed topics with their tag expressions, ordered by topic.
    pub fn subscriptions(&self) -> Vec<(String, TagExpression)> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(topic, tag)| (topic.clone(), tag.clone()))
            .collect()
    }

    /// Deliveries spawned but not yet finished.
    pub fn pending_deliveries(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    pub(crate) fn deliver(&self, message: BrokerMessage) {
        let selected = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.topic)
            .is_some_and(|tag| tag.matches(message.tags.as_deref()));
        if !selected {
            return;
        }

        let Some((listener, runtime)) = self
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|started| (started.listener.clone(), started.runtime.clone()))
        else {
            return;
        };

        let task = runtime.spawn(deliver_with_retry(self.app.clone(), listener, message));
        let mut deliveries = self.deliveries.lock().unwrap_or_else(PoisonError::into_inner);
        deliveries.retain(|task| !task.is_finished());
        deliveries.push(task);
    }
}

async fn deliver_with_retry(app: String, listener: Arc<dyn BatchListener>, message: BrokerMessage) {
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match listener.on_batch(vec![message.clone()]).await {
            Ok(()) => {
                debug!(
                    event = "loopback_delivery_ok",
                    component = COMPONENT,
                    app = app.as_str(),
                    topic = message.topic.as_str(),
                    msg_id = message.msg_id.as_str(),
                    attempt,
                    "batch delivered"
                );
                return;
            }
            Err(err) => warn!(
                event = "loopback_delivery_failed",
                component = COMPONENT,
                app = app.as_str(),
                topic = message.topic.as_str(),
                msg_id = message.msg_id.as_str(),
                attempt,
                err = %err,
                "listener failed the batch"
            ),
        }
    }

    warn!(
        event = "loopback_delivery_exhausted",
        component = COMPONENT,
        app = app.as_str(),
        topic = message.topic.as_str(),
        msg_id = message.msg_id.as_str(),
        "giving up on batch"
    );
}

#[async_trait]
impl ConsumerClient for LoopbackConsumer {
    async fn subscribe(&self, topic: &str, tag: &TagExpression) -> Result<(), BrokerError> {
        if topic.trim().is_empty() {
            return Err(BrokerError::Rejected("topic is blank".to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string(), tag.clone());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
        Ok(())
    }

    async fn start(&self, listener: Arc<dyn BatchListener>) -> Result<(), BrokerError> {
        let runtime = Handle::try_current().map_err(|err| BrokerError::Start(err.to_string()))?;
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Started { listener, runtime });
        Ok(())
    }

    /// Stops accepting messages and aborts deliveries still in flight.
    async fn shutdown(&self) {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let deliveries = mem::take(&mut *self.deliveries.lock().unwrap_or_else(PoisonError::into_inner));
        let mut aborted = 0;
        for task in deliveries {
            if !task.is_finished() {
                task.abort();
                aborted += 1;
            }
            let _ = task.await;
        }
        if aborted > 0 {
            warn!(
                event = "loopback_delivery_aborted",
                component = COMPONENT,
                app = self.app.as_str(),
                aborted,
                "consumer shut down with deliveries in flight"
            );
        }
    }
}
