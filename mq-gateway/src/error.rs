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

//! Error taxonomy shared by the gateway layers.
//!
//! [`GatewayError`] is what the produce path surfaces to HTTP callers and
//! [`GatewayError::response_status`] is the single mapping from a failure onto the
//! fixed response status enumeration.

use crate::protocol::{ResponseStatus, StatusCode};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Boxed error used at capability and hook boundaries.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Which side of the broker a client handle serves.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClientRole {
    Producer,
    Consumer,
}

impl Display for ClientRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientRole::Producer => write!(f, "producer"),
            ClientRole::Consumer => write!(f, "consumer"),
        }
    }
}

/// Failures reported by broker client implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BrokerError {
    #[error("broker client failed to start: {0}")]
    Start(String),
    #[error("broker rejected the request: {0}")]
    Rejected(String),
    #[error("no publish queue available for topic[{0}]")]
    NoQueue(String),
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Failures of one outbound callback exchange.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CallbackError {
    #[error("callback answered with non-success status {0}")]
    Status(u16),
    #[error("callback transport failed: {0}")]
    Transport(String),
    #[error("callback response could not be decoded: {0}")]
    Decode(String),
    #[error("callback timed out")]
    Timeout,
}

/// Failure to hand a message over to a subscriber; triggers broker redelivery.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeliveryError {
    #[error("No response")]
    NoResponse,
    #[error("post message to app error, callback {callback}: {source}")]
    Callback {
        callback: String,
        #[source]
        source: CallbackError,
    },
    #[error("consume listener failed: {0}")]
    Listener(String),
}

/// Request shape or header failures, answered without touching any pool.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub status: StatusCode,
    pub message: String,
}

impl ValidationError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BadRequest,
            message: message.into(),
        }
    }

    pub fn method_not_supported(method: &str) -> Self {
        Self {
            status: StatusCode::MethodNotSupported,
            message: format!("method[{method}] not supported, only support POST"),
        }
    }

    pub fn missing_header(header: &str) -> Self {
        Self::bad_request(format!("HEADER[{header}] required."))
    }
}

/// A broker client handle could not be created or started.
#[derive(Debug, Error)]
#[error("unable to start {role} client for app[{app}]: {source}")]
pub struct ResourceCreationError {
    pub app: String,
    pub role: ClientRole,
    #[source]
    pub source: BoxError,
}

/// The broker failed or refused one publish.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("encoding message error, {0}")]
    Encoding(String),
    #[error("send message error, {0}")]
    Broker(#[from] BrokerError),
    #[error("send message error, 'shardingKey' is blank.")]
    BlankShardingKey,
}

/// Failures of the subscription provisioning collaborator.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unable to read subscription source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse subscription source {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("subscription provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced on the produce path.
///
/// Delivery failures travel the other way, back to the broker as
/// [`DeliveryError`], and never reach an HTTP caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("get producer error, {0}")]
    ResourceCreation(#[from] ResourceCreationError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("too many request, please wait a moment.")]
    Overload,
    #[error("{0} is not running")]
    NotRunning(&'static str),
}

impl GatewayError {
    /// Maps this failure onto the status returned to the HTTP caller.
    pub fn response_status(&self) -> ResponseStatus {
        match self {
            GatewayError::Validation(err) => ResponseStatus::new(err.status, err.message.clone()),
            GatewayError::Overload => ResponseStatus::of(StatusCode::TooManyRequests),
            GatewayError::ResourceCreation(_)
            | GatewayError::Publish(_)
            | GatewayError::NotRunning(_) => {
                ResponseStatus::new(StatusCode::Exception, self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BrokerError, CallbackError, ClientRole, DeliveryError, GatewayError, PublishError,
        ResourceCreationError, ValidationError,
    };
    use crate::protocol::StatusCode;

    #[test]
    fn validation_error_keeps_status_and_message() {
        let status = GatewayError::from(ValidationError::missing_header("App")).response_status();
        assert_eq!(status.code, 400);
        assert_eq!(status.message, "HEADER[App] required.");

        let status =
            GatewayError::from(ValidationError::method_not_supported("GET")).response_status();
        assert_eq!(status.code, StatusCode::MethodNotSupported.code());
        assert_eq!(status.message, "method[GET] not supported, only support POST");
    }

    #[test]
    fn processing_failures_map_to_exception_with_detail() {
        let err = GatewayError::from(ResourceCreationError {
            app: "app1".to_string(),
            role: ClientRole::Producer,
            source: Box::new(BrokerError::Start("name server down".to_string())),
        });
        let status = err.response_status();
        assert_eq!(status.code, 500);
        assert!(status.message.starts_with("get producer error, "));
        assert!(status.message.contains("name server down"));

        let status =
            GatewayError::from(PublishError::Broker(BrokerError::Rejected("full".to_string())))
                .response_status();
        assert_eq!(status.code, 500);
        assert_eq!(
            status.message,
            "send message error, broker rejected the request: full"
        );
    }

    #[test]
    fn overload_uses_default_message() {
        let status = GatewayError::Overload.response_status();
        assert_eq!(status.code, 501);
        assert_eq!(status.message, "too many request, please wait a moment.");
    }

    #[test]
    fn not_running_names_the_component() {
        let status = GatewayError::NotRunning("dispatcher").response_status();
        assert_eq!(status.code, 500);
        assert_eq!(status.message, "dispatcher is not running");
    }

    #[test]
    fn delivery_errors_name_the_callback() {
        let err = DeliveryError::Callback {
            callback: "http://127.0.0.1:9100/audit".to_string(),
            source: CallbackError::Status(500),
        };
        assert_eq!(
            err.to_string(),
            "post message to app error, callback http://127.0.0.1:9100/audit: \
             callback answered with non-success status 500"
        );
        assert_eq!(DeliveryError::NoResponse.to_string(), "No response");
    }
}
