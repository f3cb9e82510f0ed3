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

use async_trait::async_trait;
use mq_gateway::broker::{
    BatchListener, BrokerClientFactory, BrokerMessage, ConsumerClient, MessageQueue,
    OutboundMessage, ProducerClient, SendResult, SendStatus,
};
use mq_gateway::error::{BrokerError, DeliveryError};
use mq_gateway::routing::subscription::TagExpression;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{watch, Notify};
use tracing::debug;

const QUEUES_PER_TOPIC: u32 = 4;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds publishes until opened, counting how many are waiting.
pub struct SendGate {
    open: watch::Sender<bool>,
    in_flight: AtomicUsize,
    arrived: Notify,
}

impl SendGate {
    pub fn closed() -> Arc<Self> {
        let (open, _) = watch::channel(false);
        Arc::new(Self {
            open,
            in_flight: AtomicUsize::new(0),
            arrived: Notify::new(),
        })
    }

    /// Publishes that reached the gate, including those already let through.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_for_in_flight(&self, count: usize) {
        loop {
            let arrived = self.arrived.notified();
            if self.in_flight() >= count {
                return;
            }
            arrived.await;
        }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    async fn pass(&self) {
        let mut open = self.open.subscribe();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.arrived.notify_waiters();
        let _ = open.wait_for(|open| *open).await;
    }
}

/// Producer double that records what it was asked to publish.
pub struct RecordingProducer {
    app: String,
    fail_start: bool,
    gate: Option<Arc<SendGate>>,
    started: AtomicBool,
    sent: Mutex<Vec<OutboundMessage>>,
    queue_ids: Mutex<Vec<u32>>,
}

impl RecordingProducer {
    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).clone()
    }

    /// Queue ids chosen for ordered publishes, in call order.
    pub fn queue_ids(&self) -> Vec<u32> {
        lock(&self.queue_ids).clone()
    }

    async fn record(&self, message: OutboundMessage) -> Result<SendResult, BrokerError> {
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        let mut sent = lock(&self.sent);
        sent.push(message);
        Ok(SendResult {
            msg_id: format!("{}-{}", self.app, sent.len()),
            status: SendStatus::SendOk,
        })
    }
}

#[async_trait]
impl ProducerClient for RecordingProducer {
    async fn start(&self) -> Result<(), BrokerError> {
        if self.fail_start {
            return Err(BrokerError::Start(format!(
                "producer for {} refused to start",
                self.app
            )));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    async fn send(&self, message: OutboundMessage) -> Result<SendResult, BrokerError> {
        self.record(message).await
    }

    async fn send_oneway(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        self.record(message).await.map(|_| ())
    }

    async fn publish_queues(&self, topic: &str) -> Result<Vec<MessageQueue>, BrokerError> {
        Ok((0..QUEUES_PER_TOPIC)
            .map(|queue_id| MessageQueue {
                topic: topic.to_string(),
                broker_name: "recording".to_string(),
                queue_id,
            })
            .collect())
    }

    async fn send_to_queue(
        &self,
        message: OutboundMessage,
        queue: &MessageQueue,
    ) -> Result<SendResult, BrokerError> {
        lock(&self.queue_ids).push(queue.queue_id);
        self.record(message).await
    }
}

/// Consumer double that records subscription calls and lets tests drive delivery.
pub struct RecordingConsumer {
    app: String,
    failing_topics: HashSet<String>,
    calls: Mutex<Vec<String>>,
    listener: Mutex<Option<Arc<dyn BatchListener>>>,
}

impl RecordingConsumer {
    pub fn app(&self) -> &str {
        &self.app
    }

    /// `subscribe <topic> <tag>`, `unsubscribe <topic>`, `start` and `shutdown`, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn is_started(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Hands `messages` to the registered listener as one broker batch.
    pub async fn deliver(&self, messages: Vec<BrokerMessage>) -> Result<(), DeliveryError> {
        let listener = lock(&self.listener).clone();
        match listener {
            Some(listener) => listener.on_batch(messages).await,
            None => Err(DeliveryError::Listener(format!(
                "consumer for {} is not started",
                self.app
            ))),
        }
    }
}

#[async_trait]
impl ConsumerClient for RecordingConsumer {
    async fn subscribe(&self, topic: &str, tag: &TagExpression) -> Result<(), BrokerError> {
        lock(&self.calls).push(format!("subscribe {topic} {tag}"));
        if self.failing_topics.contains(topic) {
            return Err(BrokerError::Rejected(format!("subscribe to {topic} refused")));
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        lock(&self.calls).push(format!("unsubscribe {topic}"));
        Ok(())
    }

    async fn start(&self, listener: Arc<dyn BatchListener>) -> Result<(), BrokerError> {
        lock(&self.calls).push("start".to_string());
        *lock(&self.listener) = Some(listener);
        Ok(())
    }

    async fn shutdown(&self) {
        lock(&self.calls).push("shutdown".to_string());
        lock(&self.listener).take();
    }
}

/// Broker factory that counts and keeps every client it creates.
#[derive(Default)]
pub struct TestBrokerFactory {
    gate: Option<Arc<SendGate>>,
    fail_producer_start: bool,
    failing_topics: HashSet<String>,
    producers_created: AtomicUsize,
    consumers_created: AtomicUsize,
    producers: Mutex<Vec<Arc<RecordingProducer>>>,
    consumers: Mutex<Vec<Arc<RecordingConsumer>>>,
}

impl TestBrokerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish waits on `gate`.
    pub fn with_gate(mut self, gate: Arc<SendGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_producer_start(mut self) -> Self {
        self.fail_producer_start = true;
        self
    }

    /// Broker-level subscribe to `topic` fails for every consumer.
    pub fn failing_subscribe(mut self, topic: &str) -> Self {
        self.failing_topics.insert(topic.to_string());
        self
    }

    pub fn producers_created(&self) -> usize {
        self.producers_created.load(Ordering::SeqCst)
    }

    pub fn consumers_created(&self) -> usize {
        self.consumers_created.load(Ordering::SeqCst)
    }

    pub fn producers(&self) -> Vec<Arc<RecordingProducer>> {
        lock(&self.producers).clone()
    }

    /// Most recently created consumer of `app`.
    pub fn consumer(&self, app: &str) -> Option<Arc<RecordingConsumer>> {
        lock(&self.consumers)
            .iter()
            .rev()
            .find(|consumer| consumer.app == app)
            .cloned()
    }
}

impl BrokerClientFactory for TestBrokerFactory {
    fn create_producer(&self, app: &str) -> Result<Arc<dyn ProducerClient>, BrokerError> {
        self.producers_created.fetch_add(1, Ordering::SeqCst);
        debug!("creating test producer for {app}");
        let producer = Arc::new(RecordingProducer {
            app: app.to_string(),
            fail_start: self.fail_producer_start,
            gate: self.gate.clone(),
            started: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            queue_ids: Mutex::new(Vec::new()),
        });
        lock(&self.producers).push(producer.clone());
        Ok(producer)
    }

    fn create_consumer(&self, app: &str) -> Result<Arc<dyn ConsumerClient>, BrokerError> {
        self.consumers_created.fetch_add(1, Ordering::SeqCst);
        debug!("creating test consumer for {app}");
        let consumer = Arc::new(RecordingConsumer {
            app: app.to_string(),
            failing_topics: self.failing_topics.clone(),
            calls: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
        });
        lock(&self.consumers).push(consumer.clone());
        Ok(consumer)
    }
}
