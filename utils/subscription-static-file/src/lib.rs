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

//! File-backed [`SubscriptionProvider`].
//!
//! The document is JSON5:
//!
//! ```json5
//! {
//!   producers: [{ app: "shop", topic: "orders" }],
//!   consumers: [{ app: "warehouse", topic: "orders", tag: "paid", callback: "http://host/cb" }],
//! }
//! ```
//!
//! The file is read again on every fetch, so edits apply on the next sync pass.

use async_trait::async_trait;
use mq_gateway::error::ProviderError;
use mq_gateway::routing::subscription::Subscription;
use mq_gateway::runtime::subscription_sync::SubscriptionProvider;
use serde::Deserialize;
use std::fs::{self, canonicalize};
use std::path::PathBuf;
use tracing::debug;

const COMPONENT: &str = "subscription_static_file";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct SubscriptionDocument {
    producers: Vec<Subscription>,
    consumers: Vec<Subscription>,
}

pub struct SubscriptionStaticFile {
    static_file: String,
}

impl SubscriptionStaticFile {
    pub fn new(static_file: impl Into<String>) -> Self {
        Self {
            static_file: static_file.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.static_file
    }

    fn load(&self) -> Result<SubscriptionDocument, ProviderError> {
        let io_error = |source| ProviderError::Io {
            path: self.static_file.clone(),
            source,
        };

        let path = canonicalize(PathBuf::from(&self.static_file)).map_err(io_error)?;
        let contents = fs::read_to_string(&path).map_err(io_error)?;
        let document = parse(&self.static_file, &contents)?;

        debug!(
            event = "subscription_file_loaded",
            component = COMPONENT,
            path = %path.display(),
            producers = document.producers.len(),
            consumers = document.consumers.len(),
            "subscription file loaded"
        );
        Ok(document)
    }
}

fn parse(path: &str, contents: &str) -> Result<SubscriptionDocument, ProviderError> {
    json5::from_str(contents).map_err(|err| ProviderError::Parse {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

#[async_trait]
impl SubscriptionProvider for SubscriptionStaticFile {
    async fn producer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError> {
        Ok(self.load()?.producers)
    }

    async fn consumer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError> {
        Ok(self.load()?.consumers)
    }
}
