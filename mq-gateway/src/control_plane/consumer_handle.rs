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

//! Consumer client of one application with its live subscriptions.

use crate::broker::{BatchListener, ConsumerClient};
use crate::callback::CallbackTransport;
use crate::data_plane::batch_router::BatchRouter;
use crate::data_plane::callback_dispatcher::CallbackDispatcher;
use crate::error::{BoxError, BrokerError};
use crate::lifecycle::{LifecycleError, LifecycleHooks, ServiceLifecycle, ServiceState};
use crate::observability::events;
use crate::routing::subscription::Subscription;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

const COMPONENT: &str = "consumer_handle";

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("topic must not be blank")]
    BlankTopic,
    #[error("invalid callback {callback}: {reason}")]
    InvalidCallback { callback: String, reason: String },
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Wraps one broker consumer plus the topic routing of its callbacks.
pub struct ConsumerHandle {
    app: String,
    client: Arc<dyn ConsumerClient>,
    transport: Arc<dyn CallbackTransport>,
    gateway_address: String,
    router: Arc<BatchRouter>,
    active: Mutex<BTreeMap<String, Subscription>>,
    lifecycle: ServiceLifecycle,
}

impl ConsumerHandle {
    pub fn new(
        app: &str,
        client: Arc<dyn ConsumerClient>,
        transport: Arc<dyn CallbackTransport>,
        gateway_address: &str,
    ) -> Self {
        Self {
            app: app.to_string(),
            client,
            transport,
            gateway_address: gateway_address.to_string(),
            router: Arc::new(BatchRouter::new(app)),
            active: Mutex::new(BTreeMap::new()),
            lifecycle: ServiceLifecycle::new(),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn router(&self) -> &Arc<BatchRouter> {
        &self.router
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// Live subscriptions ordered by topic.
    pub fn active_subscriptions(&self) -> Vec<Subscription> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Registers the callback listener, then subscribes at the broker.
    ///
    /// On broker failure the listener is withdrawn so no half registration stays
    /// behind.
    pub async fn subscribe(&self, subscription: &Subscription) -> Result<(), SubscribeError> {
        let topic = subscription.topic.as_str();
        if topic.trim().is_empty() {
            return Err(SubscribeError::BlankTopic);
        }

        let dispatcher = CallbackDispatcher::new(
            subscription.clone(),
            self.transport.clone(),
            &self.gateway_address,
        )
        .map_err(|err| SubscribeError::InvalidCallback {
            callback: subscription.callback.clone(),
            reason: err.to_string(),
        })?;

        if let Some(previous) = self.router.register(Arc::new(dispatcher)) {
            warn!(
                event = events::CONSUMER_LISTENER_REPLACED,
                component = COMPONENT,
                app = self.app.as_str(),
                topic,
                callback = previous.subscription().callback.as_str(),
                "listener already registered for topic, replacing it"
            );
        }

        if let Err(err) = self.client.subscribe(topic, &subscription.tag).await {
            self.router.unregister(topic);
            return Err(err.into());
        }

        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscription.topic.clone(), subscription.clone());
        debug!(
            event = events::CONSUMER_SUBSCRIBE_OK,
            component = COMPONENT,
            app = self.app.as_str(),
            topic,
            tag = subscription.tag.as_str(),
            callback = subscription.callback.as_str(),
            "subscribed"
        );
        Ok(())
    }

    /// Unsubscribes at the broker, then drops the listener. On broker failure
    /// the previous registration stays in place.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), SubscribeError> {
        let topic = subscription.topic.as_str();
        self.client.unsubscribe(topic).await?;
        self.router.unregister(topic);
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
        debug!(
            event = events::CONSUMER_UNSUBSCRIBE_OK,
            component = COMPONENT,
            app = self.app.as_str(),
            topic,
            "unsubscribed"
        );
        Ok(())
    }

    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start(self).await
    }

    pub async fn stop(&self) {
        self.lifecycle.stop(self).await
    }
}

#[async_trait]
impl LifecycleHooks for ConsumerHandle {
    fn name(&self) -> &str {
        "consumer"
    }

    async fn do_start(&self) -> Result<(), BoxError> {
        let listener: Arc<dyn BatchListener> = self.router.clone();
        self.client.start(listener).await.map_err(Into::into)
    }

    async fn do_stop(&self) {
        self.client.shutdown().await;
    }
}
