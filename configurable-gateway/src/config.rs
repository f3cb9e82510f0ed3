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

use mq_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) gateway: GatewayConfig,
    #[serde(default)]
    pub(crate) server: ServerConfig,
    #[serde(default)]
    pub(crate) callback_http: CallbackHttpConfig,
    #[serde(default)]
    pub(crate) broker: BrokerConfig,
    pub(crate) subscription_provider: SubscriptionProviderConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub(crate) listen_address: String,
    pub(crate) listen_port: u16,
    pub(crate) max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 8888,
            max_body_bytes: 1_048_576,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct CallbackHttpConfig {
    pub(crate) connect_timeout_ms: u64,
    pub(crate) socket_timeout_ms: u64,
    pub(crate) max_idle_per_host: usize,
}

impl Default for CallbackHttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            socket_timeout_ms: 20_000,
            max_idle_per_host: 50,
        }
    }
}

impl CallbackHttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct BrokerConfig {
    pub(crate) mode: BrokerMode,
    pub(crate) name_server_address: Option<String>,
    pub(crate) queues_per_topic: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mode: BrokerMode::Loopback,
            name_server_address: None,
            queues_per_topic: loopback_broker::DEFAULT_QUEUES_PER_TOPIC,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BrokerMode {
    #[default]
    Loopback,
    Rocketmq,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionProviderConfig {
    #[serde(default)]
    pub(crate) mode: SubscriptionProviderMode,
    pub(crate) file_path: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionProviderMode {
    #[default]
    StaticFile,
}

impl Config {
    pub fn from_json5(contents: &str) -> Result<Self, json5::Error> {
        json5::from_str(contents)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.gateway.validate()?;
        if self.server.max_body_bytes == 0 {
            anyhow::bail!("server.max_body_bytes must be greater than zero");
        }
        if self.callback_http.connect_timeout_ms == 0 || self.callback_http.socket_timeout_ms == 0 {
            anyhow::bail!("callback_http timeouts must be greater than zero");
        }
        Ok(())
    }
}
