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

use crate::{LoopbackBroker, COMPONENT};
use async_trait::async_trait;
use mq_gateway::broker::{MessageQueue, OutboundMessage, ProducerClient, SendResult, SendStatus};
use mq_gateway::error::BrokerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Producer client bound to one application.
pub struct LoopbackProducer {
    app: String,
    broker: Weak<LoopbackBroker>,
    started: AtomicBool,
}

impl LoopbackProducer {
    pub(crate) fn new(app: &str, broker: Weak<LoopbackBroker>) -> Self {
        Self {
            app: app.to_string(),
            broker,
            started: AtomicBool::new(false),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn broker(&self) -> Result<Arc<LoopbackBroker>, BrokerError> {
        self.broker
            .upgrade()
            .ok_or_else(|| BrokerError::Unavailable("loopback broker dropped".to_string()))
    }

    fn publish(
        &self,
        message: OutboundMessage,
        queue_id: Option<u32>,
        one_way: bool,
    ) -> Result<SendResult, BrokerError> {
        let msg_id = self.broker()?.publish(&self.app, message, queue_id, one_way)?;
        Ok(SendResult {
            msg_id,
            status: SendStatus::SendOk,
        })
    }
}

#[async_trait]
impl ProducerClient for LoopbackProducer {
    async fn start(&self) -> Result<(), BrokerError> {
        self.broker()?;
        self.started.store(true, Ordering::Release);
        debug!(
            event = "loopback_producer_start",
            component = COMPONENT,
            app = self.app.as_str(),
            "producer started"
        );
        Ok(())
    }

    async fn shutdown(&self) {
        self.started.store(false, Ordering::Release);
    }

    async fn send(&self, message: OutboundMessage) -> Result<SendResult, BrokerError> {
        self.publish(message, None, false)
    }

    async fn send_oneway(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        self.publish(message, None, true).map(|_| ())
    }

    async fn publish_queues(&self, topic: &str) -> Result<Vec<MessageQueue>, BrokerError> {
        Ok(self.broker()?.queues(topic))
    }

    async fn send_to_queue(
        &self,
        message: OutboundMessage,
        queue: &MessageQueue,
    ) -> Result<SendResult, BrokerError> {
        if queue.topic != message.topic {
            return Err(BrokerError::Rejected(format!(
                "queue belongs to topic {}, message targets {}",
                queue.topic, message.topic
            )));
        }
        self.publish(message, Some(queue.queue_id), false)
    }
}
