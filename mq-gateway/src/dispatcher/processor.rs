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

//! Publishes one validated request through the app's producer handle.

use crate::broker::{OutboundMessage, ProducerClient, SendResult};
use crate::control_plane::producer_pool::ProducerPool;
use crate::error::{BrokerError, GatewayError, PublishError, ValidationError};
use crate::observability::{events, fields};
use crate::protocol::{
    Charset, MessageProduceRequest, MessageProduceResponse, ResponseStatus, StatusCode,
    HEADER_DELAY_TIME_LEVEL,
};
use crate::routing::queue_selector::select_queue;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

const COMPONENT: &str = "produce_processor";
const SLOW_PUBLISH_THRESHOLD: Duration = Duration::from_millis(500);
const NO_SEND_RESULT: &str = "no send result";

/// How one request is published. Exactly one applies per request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublishMode {
    /// Fire-and-forget, no broker acknowledgment awaited.
    OneWay,
    /// Routed to the queue selected by hashing the sharding key.
    Ordered(String),
    Sync,
}

impl PublishMode {
    /// Ordered takes precedence over one-way.
    pub fn of(request: &MessageProduceRequest) -> Self {
        match (&request.orderly_sharding_key, request.one_way) {
            (Some(key), _) => PublishMode::Ordered(key.clone()),
            (None, true) => PublishMode::OneWay,
            (None, false) => PublishMode::Sync,
        }
    }
}

/// Builds the outbound message in the request's charset.
pub fn build_message(request: &MessageProduceRequest) -> Result<OutboundMessage, GatewayError> {
    let charset = Charset::lookup(&request.charset)
        .map_err(|err| PublishError::Encoding(err.to_string()))?;
    let body = charset
        .encode(request.body().unwrap_or_default())
        .map_err(|err| PublishError::Encoding(err.to_string()))?;

    let delay_level = request
        .delay_level
        .as_deref()
        .map(|level| level.trim().parse::<i32>())
        .transpose()
        .map_err(|_| {
            ValidationError::bad_request(format!("HEADER[{HEADER_DELAY_TIME_LEVEL}] must be int."))
        })?;

    Ok(OutboundMessage {
        topic: request.topic().to_string(),
        tag: request.tag().map(str::to_string),
        key: request.key().map(str::to_string),
        body: Bytes::from(body),
        delay_level,
    })
}

/// Work executed on a dispatcher worker thread.
pub struct ProduceProcessor {
    producers: Arc<ProducerPool>,
}

impl ProduceProcessor {
    pub fn new(producers: Arc<ProducerPool>) -> Self {
        Self { producers }
    }

    /// Never fails: every error becomes a response status.
    pub async fn process(&self, request: &MessageProduceRequest) -> MessageProduceResponse {
        match self.publish(request).await {
            Ok(response) => response,
            Err(err) => MessageProduceResponse::for_request(request, err.response_status()),
        }
    }

    async fn publish(
        &self,
        request: &MessageProduceRequest,
    ) -> Result<MessageProduceResponse, GatewayError> {
        let message = build_message(request)?;
        let handle = self.producers.get_or_create(request.app()).await?;
        let client = handle.client();

        let started = Instant::now();
        let sent: Result<Option<SendResult>, PublishError> = match PublishMode::of(request) {
            PublishMode::OneWay => client
                .send_oneway(message)
                .await
                .map(|()| None)
                .map_err(PublishError::from),
            PublishMode::Ordered(key) => {
                if key.trim().is_empty() {
                    Err(PublishError::BlankShardingKey)
                } else {
                    self.send_ordered(client.as_ref(), message, &key)
                        .await
                        .map(Some)
                        .map_err(PublishError::from)
                }
            }
            PublishMode::Sync => client.send(message).await.map(Some).map_err(PublishError::from),
        };

        let elapsed = started.elapsed();
        if elapsed > SLOW_PUBLISH_THRESHOLD {
            warn!(
                event = events::PRODUCE_SLOW_PUBLISH,
                component = COMPONENT,
                app = request.app(),
                topic = request.topic(),
                request_id = request.request_id(),
                elapsed_ms = fields::millis(elapsed),
                "publish exceeded latency threshold"
            );
        }

        let response = match sent? {
            Some(result) => MessageProduceResponse::for_request(
                request,
                ResponseStatus::new(StatusCode::Ok, result.status.name()),
            )
            .with_msg_id(result.msg_id),
            None => MessageProduceResponse::for_request(
                request,
                ResponseStatus::new(StatusCode::Ok, NO_SEND_RESULT),
            ),
        };
        Ok(response)
    }

    async fn send_ordered(
        &self,
        client: &dyn ProducerClient,
        message: OutboundMessage,
        key: &str,
    ) -> Result<SendResult, BrokerError> {
        let queues = client.publish_queues(&message.topic).await?;
        let queue = select_queue(&queues, key)
            .ok_or_else(|| BrokerError::NoQueue(message.topic.clone()))?
            .clone();
        client.send_to_queue(message, &queue).await
    }
}
