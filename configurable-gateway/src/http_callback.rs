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

use crate::config::CallbackHttpConfig;
use crate::events;
use async_trait::async_trait;
use mq_gateway::callback::{CallbackRequest, CallbackTransport};
use mq_gateway::error::CallbackError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

const COMPONENT: &str = "http_callback";
const JSON: &str = "application/json";

/// Pooled HTTP client used for every subscriber callback.
pub struct HttpCallbackTransport {
    client: reqwest::Client,
}

impl HttpCallbackTransport {
    pub fn new(config: &CallbackHttpConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.socket_timeout())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()?;
        Ok(Self { client })
    }

    async fn exchange(&self, request: CallbackRequest) -> Result<String, CallbackError> {
        let mut builder = self
            .client
            .post(request.url)
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(send_error)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(CallbackError::Status(status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|err| CallbackError::Decode(err.to_string()))
    }
}

#[async_trait]
impl CallbackTransport for HttpCallbackTransport {
    async fn post(&self, request: CallbackRequest) -> Result<String, CallbackError> {
        let url = request.url.to_string();
        let result = self.exchange(request).await;
        if let Err(err) = &result {
            debug!(
                event = events::CALLBACK_HTTP_FAILED,
                component = COMPONENT,
                callback = url.as_str(),
                err = %err,
                "callback exchange failed"
            );
        }
        result
    }
}

fn send_error(err: reqwest::Error) -> CallbackError {
    if err.is_timeout() {
        CallbackError::Timeout
    } else {
        CallbackError::Transport(err.to_string())
    }
}
