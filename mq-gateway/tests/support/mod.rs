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

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use integration_test_utils::{RecordingCallbackTransport, TestBrokerFactory};
use mq_gateway::broker::BrokerMessage;
use mq_gateway::config::ConsumerConfig;
use mq_gateway::control_plane::consumer_pool::ConsumerPool;
use mq_gateway::error::ProviderError;
use mq_gateway::protocol::MessageProduceRequest;
use mq_gateway::routing::subscription::Subscription;
use mq_gateway::runtime::subscription_sync::SubscriptionProvider;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const GATEWAY_ADDRESS: &str = "10.0.0.1";

/// Fixed provisioning snapshot.
pub(crate) struct StaticProvider {
    pub producers: Vec<Subscription>,
    pub consumers: Vec<Subscription>,
}

#[async_trait]
impl SubscriptionProvider for StaticProvider {
    async fn producer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError> {
        Ok(self.producers.clone())
    }

    async fn consumer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError> {
        Ok(self.consumers.clone())
    }
}

/// Decodes a POST the way the HTTP front end does.
pub(crate) fn produce_request(
    headers: &[(&str, &str)],
    body: &str,
) -> MessageProduceRequest {
    MessageProduceRequest::decode(
        "POST",
        headers.iter().copied(),
        body.as_bytes(),
        GATEWAY_ADDRESS,
    )
}

pub(crate) fn broker_message(topic: &str, msg_id: &str, body: &str) -> BrokerMessage {
    BrokerMessage {
        msg_id: msg_id.to_string(),
        topic: topic.to_string(),
        tags: Some("paid".to_string()),
        keys: Some(format!("key-{msg_id}")),
        body: Bytes::from(body.to_string()),
    }
}

pub(crate) async fn started_consumer_pool(
    factory: Arc<TestBrokerFactory>,
    transport: Arc<RecordingCallbackTransport>,
) -> Arc<ConsumerPool> {
    let pool = ConsumerPool::new(factory, transport, GATEWAY_ADDRESS, ConsumerConfig::default());
    assert!(pool.start().await.is_ok());
    pool
}

/// Polls `condition` until it holds or five seconds pass.
pub(crate) async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
