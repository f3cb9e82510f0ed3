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

//! Outbound HTTP callback capability.

use crate::error::CallbackError;
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// One POST to a subscriber's callback endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallbackRequest {
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl CallbackRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Posts bytes and returns the response body, or the reason the exchange failed.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn post(&self, request: CallbackRequest) -> Result<String, CallbackError>;
}
