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

//! Bounded admission of produce requests onto named worker threads.

use crate::config::DispatcherConfig;
use crate::dispatcher::processor::ProduceProcessor;
use crate::dispatcher::validator::{check_allow_list, validate};
use crate::error::{BoxError, GatewayError};
use crate::lifecycle::{LifecycleError, LifecycleHooks, ServiceLifecycle, ServiceState};
use crate::observability::{events, fields};
use crate::protocol::{MessageProduceRequest, MessageProduceResponse};
use crate::routing::allow_list::PublishAllowList;
use crate::runtime::worker_runtime::{join_workers, spawn_worker_loop, WorkerThread};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, warn, Level};

const COMPONENT: &str = "dispatcher";
const WORKER_THREAD_PREFIX: &str = "mq-gw-produce";
const OVERLOAD_LOG_WINDOW: Duration = Duration::from_secs(10);
const NEVER_LOGGED: u64 = u64::MAX;
const VERY_SLOW_DISPATCH_THRESHOLD: Duration = Duration::from_millis(1000);
const SLOW_DISPATCH_THRESHOLD: Duration = Duration::from_millis(500);

struct Job {
    request: MessageProduceRequest,
    reply: oneshot::Sender<MessageProduceResponse>,
}

type JobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// Front door for produce requests.
///
/// Requests are validated and checked against the allow-list on the caller's
/// task, then handed to a fixed set of worker threads through a bounded queue.
/// Submission never waits: when the queue is full the caller gets
/// `TOO_MANY_REQ` and the producer pool is not touched.
pub struct Dispatcher {
    config: DispatcherConfig,
    allow_list: Arc<PublishAllowList>,
    processor: Arc<ProduceProcessor>,
    sender: ArcSwapOption<mpsc::Sender<Job>>,
    workers: Mutex<Vec<WorkerThread>>,
    epoch: Instant,
    last_overload_log_ms: AtomicU64,
    lifecycle: ServiceLifecycle,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        allow_list: Arc<PublishAllowList>,
        processor: ProduceProcessor,
    ) -> Self {
        Self {
            config,
            allow_list,
            processor: Arc::new(processor),
            sender: ArcSwapOption::empty(),
            workers: Mutex::new(Vec::new()),
            epoch: Instant::now(),
            last_overload_log_ms: AtomicU64::new(NEVER_LOGGED),
            lifecycle: ServiceLifecycle::new(),
        }
    }

    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start(self).await
    }

    pub async fn will_stop(&self) {
        self.lifecycle.will_stop(self).await
    }

    /// Stops admitting, lets workers drain the queue and joins them.
    pub async fn stop(&self) {
        self.lifecycle.stop(self).await
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// Requests admitted but not yet taken by a worker.
    pub fn queued(&self) -> usize {
        self.sender
            .load_full()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    /// Validates, admits and awaits one request. Never fails: every outcome is a response.
    pub async fn dispatch(&self, request: MessageProduceRequest) -> MessageProduceResponse {
        let started = Instant::now();
        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::PRODUCE_REQUEST,
                component = COMPONENT,
                app = request.app(),
                topic = request.topic(),
                request_id = request.request_id(),
                internal_req_id = request.internal_req_id.as_str(),
                gateway_address = request.gateway_address.as_str(),
                one_way = request.one_way,
                orderly_sharding_key = fields::or_none(request.orderly_sharding_key.as_deref()),
                delay_level = fields::or_none(request.delay_level.as_deref()),
                content = fields::or_none(request.body()),
                "produce request"
            );
        }

        // Kept for the response when a worker drops the job without replying.
        let identity = MessageProduceRequest {
            content: None,
            ..request.clone()
        };
        let response = match self.admit(request) {
            Ok(reply) => reply.await.unwrap_or_else(|_| {
                let err = GatewayError::NotRunning(COMPONENT);
                MessageProduceResponse::for_request(&identity, err.response_status())
            }),
            Err(Rejected { err, request }) => {
                MessageProduceResponse::for_request(&request, err.response_status())
            }
        };

        self.log_outcome(&identity, &response, started.elapsed());
        response
    }

    fn admit(
        &self,
        request: MessageProduceRequest,
    ) -> Result<oneshot::Receiver<MessageProduceResponse>, Rejected> {
        if let Err(err) =
            validate(&request).and_then(|()| check_allow_list(&request, &self.allow_list))
        {
            return Err(Rejected::with_request(err.into(), request));
        }

        if !self.lifecycle.is_ready() {
            return Err(Rejected::with_request(
                GatewayError::NotRunning(COMPONENT),
                request,
            ));
        }
        let Some(sender) = self.sender.load_full() else {
            return Err(Rejected::with_request(
                GatewayError::NotRunning(COMPONENT),
                request,
            ));
        };

        let (reply, receiver) = oneshot::channel();
        match sender.try_send(Job { request, reply }) {
            Ok(()) => Ok(receiver),
            Err(TrySendError::Full(job)) => {
                self.log_overload(&job.request);
                Err(Rejected::with_request(GatewayError::Overload, job.request))
            }
            Err(TrySendError::Closed(job)) => Err(Rejected::with_request(
                GatewayError::NotRunning(COMPONENT),
                job.request,
            )),
        }
    }

    fn log_overload(&self, request: &MessageProduceRequest) {
        let now_ms = fields::millis(self.epoch.elapsed());
        let last_ms = self.last_overload_log_ms.load(Ordering::Acquire);
        if last_ms != NEVER_LOGGED
            && now_ms.saturating_sub(last_ms) < fields::millis(OVERLOAD_LOG_WINDOW)
        {
            return;
        }
        if self
            .last_overload_log_ms
            .compare_exchange(last_ms, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        warn!(
            event = events::PRODUCE_REJECTED_OVERLOAD,
            component = COMPONENT,
            app = request.app(),
            topic = request.topic(),
            request_id = request.request_id(),
            queue_capacity = self.config.queue_capacity,
            worker_threads = self.config.worker_threads,
            "dispatcher queue full, rejecting request"
        );
    }

    fn log_outcome(
        &self,
        request: &MessageProduceRequest,
        response: &MessageProduceResponse,
        elapsed: Duration,
    ) {
        if !response.is_ok() {
            error!(
                event = events::PRODUCE_FAILED,
                component = COMPONENT,
                app = request.app(),
                topic = request.topic(),
                request_id = request.request_id(),
                internal_req_id = request.internal_req_id.as_str(),
                code = response.status.code,
                err = response.status.message.as_str(),
                "produce request failed"
            );
        } else if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::PRODUCE_RESPONSE,
                component = COMPONENT,
                app = request.app(),
                topic = request.topic(),
                request_id = request.request_id(),
                internal_req_id = request.internal_req_id.as_str(),
                msg_id = fields::or_none(response.msg_id.as_deref()),
                status = response.status.message.as_str(),
                elapsed_ms = fields::millis(elapsed),
                "produce response"
            );
        }

        if elapsed > VERY_SLOW_DISPATCH_THRESHOLD {
            warn!(
                event = events::PRODUCE_SLOW_DISPATCH,
                component = COMPONENT,
                app = request.app(),
                topic = request.topic(),
                request_id = request.request_id(),
                elapsed_ms = fields::millis(elapsed),
                "dispatch took more than 1000ms"
            );
        } else if elapsed > SLOW_DISPATCH_THRESHOLD {
            warn!(
                event = events::PRODUCE_SLOW_DISPATCH,
                component = COMPONENT,
                app = request.app(),
                topic = request.topic(),
                request_id = request.request_id(),
                elapsed_ms = fields::millis(elapsed),
                "dispatch took more than 500ms"
            );
        }
    }

    async fn run_worker(worker_id: usize, receiver: JobReceiver, processor: Arc<ProduceProcessor>) {
        let context = fields::WorkerContext::with_current_thread(format!("produce-{worker_id}"));
        loop {
            let job = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            let Some(job) = job else {
                break;
            };
            let response = processor.process(&job.request).await;
            // The caller may have gone away; the outcome is already logged by then.
            let _ = job.reply.send(response);
        }

        debug!(
            event = events::RUNTIME_WORKER_EXIT,
            component = COMPONENT,
            worker_id = context.worker_id.as_str(),
            worker_thread = context.worker_thread.as_str(),
            reason = fields::REASON_CHANNEL_CLOSED,
            "produce worker stopped"
        );
    }

    fn take_workers(&self) -> Vec<WorkerThread> {
        mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl LifecycleHooks for Dispatcher {
    fn name(&self) -> &str {
        COMPONENT
    }

    async fn validate(&self) -> Result<(), BoxError> {
        if self.config.worker_threads == 0 {
            return Err("dispatcher.worker_threads must be greater than zero".into());
        }
        if self.config.queue_capacity == 0 {
            return Err("dispatcher.queue_capacity must be greater than zero".into());
        }
        Ok(())
    }

    async fn do_start(&self) -> Result<(), BoxError> {
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity);
        let receiver: JobReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut workers = Vec::with_capacity(self.config.worker_threads);
        for worker_id in 0..self.config.worker_threads {
            let worker_receiver = receiver.clone();
            let processor = self.processor.clone();
            let spawned = spawn_worker_loop(
                format!("{WORKER_THREAD_PREFIX}-{worker_id}"),
                move || Self::run_worker(worker_id, worker_receiver, processor),
            );
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    // Closing the channel lets already spawned workers exit.
                    drop(sender);
                    join_workers(workers).await;
                    return Err(err.into());
                }
            }
        }

        *self.workers.lock().unwrap_or_else(PoisonError::into_inner) = workers;
        self.sender.store(Some(Arc::new(sender)));
        Ok(())
    }

    async fn do_stop(&self) {
        self.sender.store(None);
        join_workers(self.take_workers()).await;
    }
}

struct Rejected {
    err: GatewayError,
    request: MessageProduceRequest,
}

impl Rejected {
    fn with_request(err: GatewayError, request: MessageProduceRequest) -> Self {
        Self { err, request }
    }
}

#[cfg(test)]
mod tests {
    use super::Dispatcher;
    use crate::broker::{
        BrokerClientFactory, ConsumerClient, MessageQueue, OutboundMessage, ProducerClient,
        SendResult, SendStatus,
    };
    use crate::config::{DispatcherConfig, ProducerConfig};
    use crate::control_plane::producer_pool::ProducerPool;
    use crate::dispatcher::processor::ProduceProcessor;
    use crate::error::BrokerError;
    use crate::protocol::{MessageContent, MessageProduceRequest};
    use crate::routing::allow_list::PublishAllowList;
    use crate::routing::subscription::Subscription;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    struct OkProducer;

    #[async_trait]
    impl ProducerClient for OkProducer {
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
            message: OutboundMessage,
            _queue: &MessageQueue,
        ) -> Result<SendResult, BrokerError> {
            self.send(message).await
        }
    }

    impl BrokerClientFactory for CountingFactory {
        fn create_producer(&self, _app: &str) -> Result<Arc<dyn ProducerClient>, BrokerError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(OkProducer))
        }

        fn create_consumer(&self, _app: &str) -> Result<Arc<dyn ConsumerClient>, BrokerError> {
            Err(BrokerError::Unavailable("not used".to_string()))
        }
    }

    fn request() -> MessageProduceRequest {
        MessageProduceRequest {
            topic: Some("orders".to_string()),
            app: Some("app1".to_string()),
            request_id: Some("r-1".to_string()),
            content: Some(MessageContent {
                body: Some("hello".to_string()),
                ..MessageContent::default()
            }),
            ..MessageProduceRequest::default()
        }
    }

    async fn dispatcher(factory: Arc<CountingFactory>) -> (Dispatcher, Arc<ProducerPool>) {
        let producers = ProducerPool::new(factory, ProducerConfig::default());
        producers.start().await.unwrap();
        let allow_list = Arc::new(PublishAllowList::new());
        allow_list.replace(&[Subscription::publisher("app1", "orders")]);
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_threads: 2,
                queue_capacity: 4,
            },
            allow_list,
            ProduceProcessor::new(producers.clone()),
        );
        (dispatcher, producers)
    }

    #[tokio::test]
    async fn valid_request_is_published_by_a_worker() {
        let factory = Arc::new(CountingFactory::default());
        let (dispatcher, producers) = dispatcher(factory.clone()).await;
        dispatcher.start().await.unwrap();

        let response = dispatcher.dispatch(request()).await;

        assert_eq!(response.status.code, 200);
        assert_eq!(response.status.message, "SEND_OK");
        assert_eq!(response.msg_id.as_deref(), Some("m-1"));
        assert_eq!(response.request_id.as_deref(), Some("r-1"));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        dispatcher.stop().await;
        producers.stop().await;
    }

    #[tokio::test]
    async fn unknown_pair_is_rejected_before_the_pool() {
        let factory = Arc::new(CountingFactory::default());
        let (dispatcher, _producers) = dispatcher(factory.clone()).await;
        dispatcher.start().await.unwrap();

        let response = dispatcher
            .dispatch(MessageProduceRequest {
                topic: Some("payments".to_string()),
                ..request()
            })
            .await;

        assert_eq!(response.status.code, 400);
        assert_eq!(
            response.status.message,
            "subscription[app: app1, topic: payments] is not found."
        );
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn stopped_dispatcher_reports_not_running() {
        let factory = Arc::new(CountingFactory::default());
        let (dispatcher, _producers) = dispatcher(factory.clone()).await;

        let response = dispatcher.dispatch(request()).await;

        assert_eq!(response.status.code, 500);
        assert_eq!(response.status.message, "dispatcher is not running");
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_workers_fail_validation() {
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                worker_threads: 0,
                queue_capacity: 1,
            },
            Arc::new(PublishAllowList::new()),
            ProduceProcessor::new(ProducerPool::new(
                Arc::new(CountingFactory::default()),
                ProducerConfig::default(),
            )),
        );

        assert!(dispatcher.start().await.is_err());
        assert!(!dispatcher.is_ready());
    }
}
