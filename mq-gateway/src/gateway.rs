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

use crate::broker::BrokerClientFactory;
use crate::callback::CallbackTransport;
use crate::config::{ConfigError, GatewayConfig};
use crate::control_plane::consumer_pool::ConsumerPool;
use crate::control_plane::producer_pool::ProducerPool;
use crate::dispatcher::processor::ProduceProcessor;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::LifecycleError;
use crate::observability::events;
use crate::protocol::{MessageProduceRequest, MessageProduceResponse};
use crate::routing::allow_list::PublishAllowList;
use crate::runtime::subscription_sync::{SubscriptionProvider, SubscriptionSync};
use crate::subscription_sync_health::SubscriptionSyncHealth;
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "gateway";

/// Owns every gateway component and their start and teardown order.
///
/// Start brings up the producer pool, the consumer pool, the subscription sync
/// and finally the dispatcher, so requests are admitted only once the allow-list
/// has been loaded. Stop runs in reverse.
pub struct Gateway {
    config: GatewayConfig,
    allow_list: Arc<PublishAllowList>,
    producers: Arc<ProducerPool>,
    consumers: Arc<ConsumerPool>,
    sync: Arc<SubscriptionSync>,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        broker: Arc<dyn BrokerClientFactory>,
        callbacks: Arc<dyn CallbackTransport>,
        provider: Arc<dyn SubscriptionProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let allow_list = Arc::new(PublishAllowList::new());
        let producers = ProducerPool::new(broker.clone(), config.producer.clone());
        let consumers = ConsumerPool::new(
            broker,
            callbacks,
            &config.gateway_address,
            config.consumer.clone(),
        );
        let sync = SubscriptionSync::new(
            provider,
            allow_list.clone(),
            consumers.clone(),
            config.subscription.refresh_interval(),
        );
        let dispatcher = Dispatcher::new(
            config.dispatcher.clone(),
            allow_list.clone(),
            ProduceProcessor::new(producers.clone()),
        );

        Ok(Self {
            config,
            allow_list,
            producers,
            consumers,
            sync,
            dispatcher,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn gateway_address(&self) -> &str {
        &self.config.gateway_address
    }

    pub fn allow_list(&self) -> &Arc<PublishAllowList> {
        &self.allow_list
    }

    pub fn producers(&self) -> &Arc<ProducerPool> {
        &self.producers
    }

    pub fn consumers(&self) -> &Arc<ConsumerPool> {
        &self.consumers
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Starts every component; on failure the already started ones are stopped again.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        if let Err(err) = self.start_components().await {
            warn!(
                event = events::LIFECYCLE_START_FAILED,
                component = COMPONENT,
                err = %err,
                "gateway failed to start"
            );
            self.stop().await;
            return Err(err);
        }

        info!(
            event = events::LIFECYCLE_START_OK,
            component = COMPONENT,
            gateway_address = self.config.gateway_address.as_str(),
            worker_threads = self.config.dispatcher.worker_threads,
            queue_capacity = self.config.dispatcher.queue_capacity,
            "gateway started"
        );
        Ok(())
    }

    async fn start_components(&self) -> Result<(), LifecycleError> {
        self.producers.start().await?;
        self.consumers.start().await?;
        self.sync.start().await?;
        self.dispatcher.start().await
    }

    /// Stops admission and signals every pool so background loops exit without
    /// waiting for their timers.
    ///
    /// Jobs already admitted keep publishing until [`Gateway::stop`] has drained
    /// the dispatcher.
    pub async fn will_stop(&self) {
        tokio::join!(
            self.dispatcher.will_stop(),
            self.sync.will_stop(),
            self.consumers.will_stop(),
            self.producers.will_stop(),
        );
    }

    pub async fn stop(&self) {
        self.dispatcher.stop().await;
        self.sync.stop().await;
        self.consumers.stop().await;
        self.producers.stop().await;

        info!(
            event = events::LIFECYCLE_STOP_OK,
            component = COMPONENT,
            "gateway stopped"
        );
    }

    pub async fn dispatch(&self, request: MessageProduceRequest) -> MessageProduceResponse {
        self.dispatcher.dispatch(request).await
    }

    /// Runs one subscription pass now and reports the resulting sync health.
    pub async fn refresh_subscriptions(&self) -> SubscriptionSyncHealth {
        if let Err(err) = self.sync.sync_once().await {
            warn!(
                event = events::SUBSCRIPTION_SYNC_FAILED,
                component = COMPONENT,
                err = %err,
                "subscription refresh failed, keeping previous sets"
            );
        }
        self.sync.health()
    }

    pub fn subscription_health(&self) -> SubscriptionSyncHealth {
        self.sync.health()
    }
}

#[cfg(test)]
mod tests {
    use super::Gateway;
    use crate::broker::{
        BatchListener, BrokerClientFactory, ConsumerClient, MessageQueue, OutboundMessage,
        ProducerClient, SendResult, SendStatus,
    };
    use crate::callback::{CallbackRequest, CallbackTransport};
    use crate::config::GatewayConfig;
    use crate::error::{BrokerError, CallbackError, ProviderError};
    use crate::lifecycle::ServiceState;
    use crate::protocol::{MessageContent, MessageProduceRequest};
    use crate::routing::subscription::{Subscription, TagExpression};
    use crate::runtime::subscription_sync::SubscriptionProvider;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopProducer;

    #[async_trait]
    impl ProducerClient for NoopProducer {
        async fn start(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn shutdown(&self) {}

        async fn send(&self, _message: OutboundMessage) -> Result<SendResult, BrokerError> {
            Ok(SendResult {
                msg_id: "m-1".to_string(),
                status: SendStatus::SendOk,
            })
        }

        async fn send_oneway(&self, _message: OutboundMessage) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn publish_queues(&self, _topic: &str) -> Result<Vec<MessageQueue>, BrokerError> {
            Ok(Vec::new())
        }

        async fn send_to_queue(
            &self,
            _message: OutboundMessage,
            _queue: &MessageQueue,
        ) -> Result<SendResult, BrokerError> {
            Err(BrokerError::NoQueue("unused".to_string()))
        }
    }

    struct NoopConsumer;

    #[async_trait]
    impl ConsumerClient for NoopConsumer {
        async fn subscribe(&self, _topic: &str, _tag: &TagExpression) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn unsubscribe(&self, _topic: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn start(&self, _listener: Arc<dyn BatchListener>) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn shutdown(&self) {}
    }

    struct NoopFactory;

    impl BrokerClientFactory for NoopFactory {
        fn create_producer(&self, _app: &str) -> Result<Arc<dyn ProducerClient>, BrokerError> {
            Ok(Arc::new(NoopProducer))
        }

        fn create_consumer(&self, _app: &str) -> Result<Arc<dyn ConsumerClient>, BrokerError> {
            Ok(Arc::new(NoopConsumer))
        }
    }

    struct AckTransport;

    #[async_trait]
    impl CallbackTransport for AckTransport {
        async fn post(&self, _request: CallbackRequest) -> Result<String, CallbackError> {
            Ok("ok".to_string())
        }
    }

    struct FixedProvider;

    #[async_trait]
    impl SubscriptionProvider for FixedProvider {
        async fn producer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError> {
            Ok(vec![Subscription::publisher("app1", "orders")])
        }

        async fn consumer_subscriptions(&self) -> Result<Vec<Subscription>, ProviderError> {
            Ok(vec![Subscription::new(
                "app2",
                "orders",
                "*",
                "http://127.0.0.1:9000/cb",
            )])
        }
    }

    fn gateway(config: GatewayConfig) -> Gateway {
        Gateway::new(
            config,
            Arc::new(NoopFactory),
            Arc::new(AckTransport),
            Arc::new(FixedProvider),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = GatewayConfig::default();
        config.dispatcher.worker_threads = 0;
        assert!(Gateway::new(
            config,
            Arc::new(NoopFactory),
            Arc::new(AckTransport),
            Arc::new(FixedProvider),
        )
        .is_err());
    }

    #[tokio::test]
    async fn start_loads_subscriptions_and_serves_requests() {
        let mut config = GatewayConfig::default();
        config.dispatcher.worker_threads = 1;
        let gateway = gateway(config);
        gateway.start().await.unwrap();

        assert!(gateway.allow_list().contains("app1", "orders"));
        assert_eq!(gateway.consumers().apps(), vec!["app2".to_string()]);
        assert_eq!(gateway.subscription_health().last_attempt_succeeded, Some(true));

        let response = gateway
            .dispatch(MessageProduceRequest {
                topic: Some("orders".to_string()),
                app: Some("app1".to_string()),
                request_id: Some("r-1".to_string()),
                content: Some(MessageContent {
                    body: Some("hello".to_string()),
                    ..MessageContent::default()
                }),
                ..MessageProduceRequest::default()
            })
            .await;
        assert_eq!(response.status.code, 200);

        gateway.will_stop().await;
        gateway.stop().await;

        assert_eq!(gateway.dispatcher().state(), ServiceState::Stopped);
        assert_eq!(gateway.producers().state(), ServiceState::Stopped);
        assert!(gateway.producers().is_empty());
        assert!(gateway.consumers().is_empty());
    }
}
