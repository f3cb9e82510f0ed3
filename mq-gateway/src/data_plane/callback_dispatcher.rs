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

//! Sequential HTTP callback delivery for one consumer subscription.

use crate::broker::BrokerMessage;
use crate::callback::{CallbackRequest, CallbackTransport};
use crate::error::DeliveryError;
use crate::observability::{events, fields};
use crate::protocol::{HEADER_KEY, HEADER_REQUEST_ID, HEADER_TAG, HEADER_TOPIC};
use crate::routing::subscription::Subscription;
use std::sync::Arc;
use tracing::{debug, error, Level};
use url::Url;
use uuid::Uuid;

const COMPONENT: &str = "callback_dispatcher";
const NO_RESPONSE: &str = "No response";

/// Outcome of one sub-batch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub last_failure: Option<DeliveryError>,
}

impl DispatchReport {
    pub fn into_result(self) -> Result<(), DeliveryError> {
        match self.last_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Posts every message of a topic's sub-batch to the subscription's callback.
pub struct CallbackDispatcher {
    subscription: Subscription,
    callback_url: Url,
    transport: Arc<dyn CallbackTransport>,
    gateway_address: String,
}

impl CallbackDispatcher {
    pub fn new(
        subscription: Subscription,
        transport: Arc<dyn CallbackTransport>,
        gateway_address: &str,
    ) -> Result<Self, url::ParseError> {
        let callback_url = Url::parse(subscription.callback.trim())?;
        Ok(Self {
            subscription,
            callback_url,
            transport,
            gateway_address: gateway_address.to_string(),
        })
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Delivers messages in order. A failing message does not stop the others.
    pub async fn dispatch(&self, messages: &[BrokerMessage]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for message in messages {
            match self.deliver(message).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    report.last_failure = Some(err);
                }
            }
        }

        report
    }

    async fn deliver(&self, message: &BrokerMessage) -> Result<(), DeliveryError> {
        let subscription = &self.subscription;
        let request_id = Uuid::new_v4().to_string();
        let key = fields::or_none(message.keys.as_deref());

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::CALLBACK_REQUEST,
                component = COMPONENT,
                topic = subscription.topic.as_str(),
                tag = subscription.tag.as_str(),
                app = subscription.app.as_str(),
                callback = subscription.callback.as_str(),
                gateway_address = self.gateway_address.as_str(),
                internal_req_id = request_id.as_str(),
                msg_id = message.msg_id.as_str(),
                key,
                "posting message to callback"
            );
        }

        let request = CallbackRequest {
            url: self.callback_url.clone(),
            headers: vec![
                (HEADER_TAG, message.tags.clone().unwrap_or_default()),
                (HEADER_TOPIC, subscription.topic.clone()),
                (HEADER_REQUEST_ID, request_id.clone()),
                (HEADER_KEY, message.keys.clone().unwrap_or_default()),
            ],
            body: message.body.clone(),
        };

        let (outcome, content) = match self.transport.post(request).await {
            Ok(response) if response.trim().is_empty() => {
                (Err(DeliveryError::NoResponse), NO_RESPONSE.to_string())
            }
            Ok(response) => (Ok(()), response),
            Err(err) => {
                let content = err.to_string();
                (
                    Err(DeliveryError::Callback {
                        callback: subscription.callback.clone(),
                        source: err,
                    }),
                    content,
                )
            }
        };

        if outcome.is_err() {
            error!(
                event = events::CALLBACK_RESPONSE,
                component = COMPONENT,
                topic = subscription.topic.as_str(),
                tag = subscription.tag.as_str(),
                app = subscription.app.as_str(),
                callback = subscription.callback.as_str(),
                gateway_address = self.gateway_address.as_str(),
                internal_req_id = request_id.as_str(),
                msg_id = message.msg_id.as_str(),
                key,
                success = false,
                content = content.as_str(),
                "callback delivery failed"
            );
        } else {
            debug!(
                event = events::CALLBACK_RESPONSE,
                component = COMPONENT,
                topic = subscription.topic.as_str(),
                tag = subscription.tag.as_str(),
                app = subscription.app.as_str(),
                callback = subscription.callback.as_str(),
                gateway_address = self.gateway_address.as_str(),
                internal_req_id = request_id.as_str(),
                msg_id = message.msg_id.as_str(),
                key,
                success = true,
                content = content.as_str(),
                "callback acknowledged message"
            );
        }

        outcome
    }
}
