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

//! In-process broker for local runs and tests.
//!
//! Topics need no provisioning. Every topic has the same fixed number of queues,
//! and a published message is delivered to every started consumer subscribed to
//! its topic whose tag expression matches, one message per batch. A batch the
//! listener fails is redelivered up to [`DELIVERY_ATTEMPTS`] times in total.

mod consumer;
mod producer;

pub use consumer::LoopbackConsumer;
pub use producer::LoopbackProducer;

use mq_gateway::broker::{
    BrokerClientFactory, BrokerMessage, ConsumerClient, MessageQueue, OutboundMessage,
    ProducerClient,
};
use mq_gateway::error::BrokerError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

pub const DEFAULT_QUEUES_PER_TOPIC: u32 = 4;
pub const DELIVERY_ATTEMPTS: usize = 3;
pub const BROKER_NAME: &str = "loopback";
/// Accepted messages kept for [`LoopbackBroker::published`].
pub const DEFAULT_PUBLISHED_HISTORY: usize = 1024;

const COMPONENT: &str = "loopback_broker";

/// A message accepted by the broker, as recorded for inspection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishedMessage {
    pub app: String,
    pub msg_id: String,
    pub queue_id: u32,
    pub one_way: bool,
    pub message: OutboundMessage,
}

pub struct LoopbackBroker {
    queues_per_topic: u32,
    sequence: AtomicU64,
    history: usize,
    published: Mutex<VecDeque<PublishedMessage>>,
    consumers: Mutex<Vec<Weak<LoopbackConsumer>>>,
    this: Weak<LoopbackBroker>,
}

impl LoopbackBroker {
    pub fn new() -> Arc<Self> {
        Self::with_queues(DEFAULT_QUEUES_PER_TOPIC)
    }

    /// A zero queue count is raised to one.
    pub fn with_queues(queues_per_topic: u32) -> Arc<Self> {
        Self::with_limits(queues_per_topic, DEFAULT_PUBLISHED_HISTORY)
    }

    /// Like [`LoopbackBroker::with_queues`], keeping only the last `history`
    /// accepted messages. Zero keeps none.
    pub fn with_limits(queues_per_topic: u32, history: usize) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            queues_per_topic: queues_per_topic.max(1),
            sequence: AtomicU64::new(0),
            history,
            published: Mutex::new(VecDeque::with_capacity(history.min(DEFAULT_PUBLISHED_HISTORY))),
            consumers: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn queues(&self, topic: &str) -> Vec<MessageQueue> {
        (0..self.queues_per_topic)
            .map(|queue_id| MessageQueue {
                topic: topic.to_string(),
                broker_name: BROKER_NAME.to_string(),
                queue_id,
            })
            .collect()
    }

    /// The most recently accepted messages, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Registers a consumer for `app` and returns its concrete handle.
    pub fn loopback_consumer(&self, app: &str) -> Arc<LoopbackConsumer> {
        let consumer = Arc::new(LoopbackConsumer::new(app));
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&consumer));
        consumer
    }

    pub(crate) fn publish(
        &self,
        app: &str,
        message: OutboundMessage,
        queue_id: Option<u32>,
        one_way: bool,
    ) -> Result<String, BrokerError> {
        if message.topic.trim().is_empty() {
            return Err(BrokerError::Rejected("topic is blank".to_string()));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let queue_id = match queue_id {
            Some(queue_id) if queue_id >= self.queues_per_topic => {
                return Err(BrokerError::Rejected(format!(
                    "queue {queue_id} does not exist for topic {}",
                    message.topic
                )));
            }
            Some(queue_id) => queue_id,
            None => (sequence % u64::from(self.queues_per_topic)) as u32,
        };

        let published = PublishedMessage {
            app: app.to_string(),
            msg_id: format!("LB{sequence:016X}"),
            queue_id,
            one_way,
            message,
        };
        debug!(
            event = "loopback_publish",
            component = COMPONENT,
            app,
            topic = published.message.topic.as_str(),
            queue_id,
            msg_id = published.msg_id.as_str(),
            "message accepted"
        );

        let msg_id = published.msg_id.clone();
        self.route(&published);
        self.record(published);
        Ok(msg_id)
    }

    fn record(&self, published: PublishedMessage) {
        if self.history == 0 {
            return;
        }
        let mut history = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() == self.history {
            history.pop_front();
        }
        history.push_back(published);
    }

    fn route(&self, published: &PublishedMessage) {
        let consumers: Vec<Arc<LoopbackConsumer>> = {
            let mut registered = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);
            registered.retain(|consumer| consumer.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };

        for consumer in consumers {
            consumer.deliver(BrokerMessage {
                msg_id: published.msg_id.clone(),
                topic: published.message.topic.clone(),
                tags: published.message.tag.clone(),
                keys: published.message.key.clone(),
                body: published.message.body.clone(),
            });
        }
    }
}

impl BrokerClientFactory for LoopbackBroker {
    fn create_producer(&self, app: &str) -> Result<Arc<dyn ProducerClient>, BrokerError> {
        Ok(Arc::new(LoopbackProducer::new(app, self.this.clone())))
    }

    fn create_consumer(&self, app: &str) -> Result<Arc<dyn ConsumerClient>, BrokerError> {
        Ok(self.loopback_consumer(app))
    }
}

#[cfg(test)]
mod tests {
    use super::LoopbackBroker;
    use bytes::Bytes;
    use mq_gateway::broker::{
        BatchListener, BrokerClientFactory, BrokerMessage, ConsumerClient, OutboundMessage,
        ProducerClient,
    };
    use mq_gateway::error::DeliveryError;
    use mq_gateway::routing::subscription::TagExpression;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Stalled;

    #[async_trait::async_trait]
    impl BatchListener for Stalled {
        async fn on_batch(&self, _messages: Vec<BrokerMessage>) -> Result<(), DeliveryError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<Vec<BrokerMessage>>>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl BatchListener for Recorder {
        async fn on_batch(&self, messages: Vec<BrokerMessage>) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DeliveryError::NoResponse);
            }
            self.batches.lock().unwrap().push(messages);
            Ok(())
        }
    }

    fn message(topic: &str, tag: Option<&str>) -> OutboundMessage {
        OutboundMessage {
            topic: topic.to_string(),
            tag: tag.map(str::to_string),
            key: Some("k".to_string()),
            body: Bytes::from_static(b"payload"),
            delay_level: None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn delivers_matching_tags_to_started_consumers() {
        let broker = LoopbackBroker::new();
        let consumer = broker.create_consumer("warehouse").unwrap();
        consumer
            .subscribe("orders", &TagExpression::parse(Some("paid || refunded")))
            .await
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        consumer.start(recorder.clone()).await.unwrap();

        let producer = broker.create_producer("shop").unwrap();
        producer.start().await.unwrap();
        producer.send(message("orders", Some("paid"))).await.unwrap();
        producer.send(message("orders", Some("created"))).await.unwrap();
        producer.send_oneway(message("invoices", Some("paid"))).await.unwrap();
        settle().await;

        let batches = recorder.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].tags.as_deref(), Some("paid"));
        assert_eq!(broker.published().len(), 3);
        assert!(broker.published()[2].one_way);
    }

    #[tokio::test]
    async fn failed_batches_are_redelivered_a_bounded_number_of_times() {
        let broker = LoopbackBroker::new();
        let consumer = broker.create_consumer("warehouse").unwrap();
        consumer.subscribe("orders", &TagExpression::All).await.unwrap();
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        consumer.start(recorder.clone()).await.unwrap();

        let producer = broker.create_producer("shop").unwrap();
        producer.send(message("orders", None)).await.unwrap();
        settle().await;

        assert_eq!(recorder.calls.load(Ordering::SeqCst), super::DELIVERY_ATTEMPTS);
    }

    #[tokio::test]
    async fn explicit_queue_must_exist() {
        let broker = LoopbackBroker::with_queues(2);
        let producer = broker.create_producer("shop").unwrap();

        let queues = producer.publish_queues("orders").await.unwrap();
        assert_eq!(queues.len(), 2);

        let sent = producer
            .send_to_queue(message("orders", None), &queues[1])
            .await
            .unwrap();
        assert!(sent.msg_id.starts_with("LB"));
        assert_eq!(broker.published()[0].queue_id, 1);

        let mut missing = queues[1].clone();
        missing.queue_id = 7;
        assert!(producer.send_to_queue(message("orders", None), &missing).await.is_err());
    }

    #[tokio::test]
    async fn shut_down_consumers_receive_nothing() {
        let broker = LoopbackBroker::new();
        let consumer = broker.create_consumer("warehouse").unwrap();
        consumer.subscribe("orders", &TagExpression::All).await.unwrap();
        let recorder = Arc::new(Recorder::default());
        consumer.start(recorder.clone()).await.unwrap();
        consumer.shutdown().await;

        let producer = broker.create_producer("shop").unwrap();
        producer.send(message("orders", None)).await.unwrap();
        settle().await;

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn published_history_keeps_only_the_latest_messages() {
        let broker = LoopbackBroker::with_limits(1, 2);
        let producer = broker.create_producer("shop").unwrap();

        let mut msg_ids = Vec::new();
        for _ in 0..3 {
            msg_ids.push(producer.send(message("orders", None)).await.unwrap().msg_id);
        }

        let kept: Vec<String> = broker.published().into_iter().map(|m| m.msg_id).collect();
        assert_eq!(kept, msg_ids[1..].to_vec());

        let silent = LoopbackBroker::with_limits(1, 0);
        let producer = silent.create_producer("shop").unwrap();
        producer.send(message("orders", None)).await.unwrap();
        assert!(silent.published().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn deliveries_outlive_the_publishing_runtime() {
        let broker = LoopbackBroker::new();
        let consumer = broker.create_consumer("warehouse").unwrap();
        consumer.subscribe("orders", &TagExpression::All).await.unwrap();
        let recorder = Arc::new(Recorder::default());
        consumer.start(recorder.clone()).await.unwrap();

        let producer = broker.create_producer("shop").unwrap();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                producer.start().await.unwrap();
                producer.send(message("orders", None)).await.unwrap();
            });
        })
        .join()
        .unwrap();
        settle().await;

        assert_eq!(recorder.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_aborts_deliveries_in_flight() {
        let broker = LoopbackBroker::new();
        let consumer = broker.loopback_consumer("warehouse");
        consumer.subscribe("orders", &TagExpression::All).await.unwrap();
        consumer.start(Arc::new(Stalled)).await.unwrap();

        let producer = broker.create_producer("shop").unwrap();
        producer.send(message("orders", None)).await.unwrap();
        settle().await;
        assert_eq!(consumer.pending_deliveries(), 1);

        tokio::time::timeout(Duration::from_secs(5), consumer.shutdown())
            .await
            .unwrap();
        assert_eq!(consumer.pending_deliveries(), 0);
        assert!(!consumer.is_started());
    }
}
