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

//! Broker client capability consumed by the gateway.
//!
//! The gateway never speaks a broker wire protocol itself. Deployments plug in a
//! [`BrokerClientFactory`] that hands out one producer and one consumer client per
//! application.

use crate::error::{BrokerError, DeliveryError};
use crate::routing::subscription::TagExpression;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A message ready to be published.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub tag: Option<String>,
    pub key: Option<String>,
    pub body: Bytes,
    pub delay_level: Option<i32>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendStatus {
    SendOk,
    FlushDiskTimeout,
    FlushSlaveTimeout,
    SlaveNotAvailable,
}

impl SendStatus {
    pub fn name(self) -> &'static str {
        match self {
            SendStatus::SendOk => "SEND_OK",
            SendStatus::FlushDiskTimeout => "FLUSH_DISK_TIMEOUT",
            SendStatus::FlushSlaveTimeout => "FLUSH_SLAVE_TIMEOUT",
            SendStatus::SlaveNotAvailable => "SLAVE_NOT_AVAILABLE",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendResult {
    pub msg_id: String,
    pub status: SendStatus,
}

/// One publish partition of a topic.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MessageQueue {
    pub topic: String,
    pub broker_name: String,
    pub queue_id: u32,
}

/// A message delivered by the broker to a consumer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BrokerMessage {
    pub msg_id: String,
    pub topic: String,
    pub tags: Option<String>,
    pub keys: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait ProducerClient: Send + Sync {
    async fn start(&self) -> Result<(), BrokerError>;

    async fn shutdown(&self);

    /// Publishes and waits for the broker's acknowledgment.
    async fn send(&self, message: OutboundMessage) -> Result<SendResult, BrokerError>;

    /// Publishes without waiting for an acknowledgment.
    async fn send_oneway(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    async fn publish_queues(&self, topic: &str) -> Result<Vec<MessageQueue>, BrokerError>;

    async fn send_to_queue(
        &self,
        message: OutboundMessage,
        queue: &MessageQueue,
    ) -> Result<SendResult, BrokerError>;
}

/// Single entry point the broker calls with a batch of possibly mixed topics.
///
/// Returning an error asks the broker to redeliver the whole batch.
#[async_trait]
pub trait BatchListener: Send + Sync {
    async fn on_batch(&self, messages: Vec<BrokerMessage>) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait ConsumerClient: Send + Sync {
    async fn subscribe(&self, topic: &str, tag: &TagExpression) -> Result<(), BrokerError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError>;

    async fn start(&self, listener: Arc<dyn BatchListener>) -> Result<(), BrokerError>;

    async fn shutdown(&self);
}

/// Creates broker clients bound to one application.
pub trait BrokerClientFactory: Send + Sync {
    fn create_producer(&self, app: &str) -> Result<Arc<dyn ProducerClient>, BrokerError>;

    fn create_consumer(&self, app: &str) -> Result<Arc<dyn ConsumerClient>, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::SendStatus;

    #[test]
    fn send_status_names_match_broker_vocabulary() {
        assert_eq!(SendStatus::SendOk.name(), "SEND_OK");
        assert_eq!(SendStatus::SlaveNotAvailable.name(), "SLAVE_NOT_AVAILABLE");
    }
}
