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

//! # mq-gateway
//!
//! `mq-gateway` fronts a topic-based message broker with an HTTP protocol. Producer
//! applications publish by posting a request with routing headers; consumer
//! applications receive messages as HTTP callbacks to the URL they subscribed with.
//!
//! Typical usage is centered on [`Gateway`], built from a [`GatewayConfig`], a
//! [`broker::BrokerClientFactory`], a [`callback::CallbackTransport`] and a
//! [`runtime::subscription_sync::SubscriptionProvider`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use mq_gateway::broker::BrokerClientFactory;
//! use mq_gateway::callback::CallbackTransport;
//! use mq_gateway::protocol::MessageProduceRequest;
//! use mq_gateway::runtime::subscription_sync::SubscriptionProvider;
//! use mq_gateway::{Gateway, GatewayConfig};
//!
//! # async fn run(
//! #     broker: Arc<dyn BrokerClientFactory>,
//! #     callbacks: Arc<dyn CallbackTransport>,
//! #     provider: Arc<dyn SubscriptionProvider>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::new(GatewayConfig::default(), broker, callbacks, provider)?;
//! gateway.start().await?;
//!
//! let request = MessageProduceRequest::decode(
//!     "POST",
//!     [("Topic", "orders"), ("App", "shop"), ("Request-ID", "r-1")],
//!     br#"{"tag":"paid","body":"order 42"}"#,
//!     gateway.gateway_address(),
//! );
//! let response = gateway.dispatch(request).await;
//! println!("{}", response.to_body_json()?);
//!
//! gateway.will_stop().await;
//! gateway.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Internal architecture map
//!
//! - Lifecycle: the shared start/stop state machine every managed resource runs on
//! - Control plane: producer and consumer pools keyed by application
//! - Routing: subscription model, reconciliation, publish allow-list, ordered queue selection
//! - Data plane: batch routing and HTTP callback delivery
//! - Dispatcher: request validation and admission onto produce workers
//! - Runtime: worker threads and the periodic subscription sync
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

pub mod broker;
pub mod callback;
pub mod config;
pub mod control_plane;
pub mod data_plane;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod routing;
pub mod runtime;

#[doc(hidden)]
pub mod observability;

mod subscription_sync_health;
pub use subscription_sync_health::SubscriptionSyncHealth;

mod gateway;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
