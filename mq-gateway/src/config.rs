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

//! Gateway tuning knobs.
//!
//! Every field has a default, so an empty JSON5 document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("unable to parse gateway config: {0}")]
    Parse(String),
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct GatewayConfig {
    /// Address stamped on request and callback log records.
    pub gateway_address: String,
    pub dispatcher: DispatcherConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
    pub subscription: SubscriptionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_address: "127.0.0.1".to_string(),
            dispatcher: DispatcherConfig::default(),
            producer: ProducerConfig::default(),
            consumer: ConsumerConfig::default(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct DispatcherConfig {
    pub worker_threads: usize,
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: 8,
            queue_capacity: 10_000,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ProducerConfig {
    pub max_idle_time_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_idle_time_secs: 86_400,
            idle_check_interval_secs: 3_600,
        }
    }
}

impl ProducerConfig {
    pub fn max_idle_time(&self) -> Duration {
        Duration::from_secs(self.max_idle_time_secs)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ConsumerConfig {
    pub idle_check_interval_secs: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            idle_check_interval_secs: 300,
        }
    }
}

impl ConsumerConfig {
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct SubscriptionConfig {
    pub refresh_interval_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
        }
    }
}

impl SubscriptionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl GatewayConfig {
    pub fn from_json5(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            json5::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("dispatcher.worker_threads", self.dispatcher.worker_threads as u64),
            ("dispatcher.queue_capacity", self.dispatcher.queue_capacity as u64),
            ("producer.max_idle_time_secs", self.producer.max_idle_time_secs),
            (
                "producer.idle_check_interval_secs",
                self.producer.idle_check_interval_secs,
            ),
            (
                "consumer.idle_check_interval_secs",
                self.consumer.idle_check_interval_secs,
            ),
            (
                "subscription.refresh_interval_secs",
                self.subscription.refresh_interval_secs,
            ),
        ];

        match checks.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::Zero(field)),
            None => Ok(()),
        }
    }
}
