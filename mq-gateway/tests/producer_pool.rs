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

mod support;

use integration_test_utils::TestBrokerFactory;
use mq_gateway::config::ProducerConfig;
use mq_gateway::control_plane::producer_pool::ProducerPool;
use mq_gateway::GatewayError;
use std::sync::Arc;
use std::time::Duration;

fn idle_config() -> ProducerConfig {
    ProducerConfig {
        max_idle_time_secs: 60,
        idle_check_interval_secs: 3_600,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_or_create_builds_one_client() {
    integration_test_utils::init_logging();

    let factory = Arc::new(TestBrokerFactory::new());
    let pool = ProducerPool::new(factory.clone(), ProducerConfig::default());
    pool.start().await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get_or_create("shop").await })
        })
        .collect();

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(factory.producers_created(), 1);
    assert_eq!(pool.len(), 1);
    assert!(handles
        .iter()
        .all(|handle| Arc::ptr_eq(handle, &handles[0])));

    pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn idle_handles_are_evicted_and_active_ones_survive() {
    integration_test_utils::init_logging();

    let factory = Arc::new(TestBrokerFactory::new());
    let pool = ProducerPool::new(factory.clone(), idle_config());
    pool.start().await.unwrap();

    pool.get_or_create("idle-app").await.unwrap();
    pool.get_or_create("busy-app").await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    pool.get_or_create("busy-app").await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;

    assert_eq!(pool.evict_idle_producers().await, 1);
    assert!(pool.handle("idle-app").is_none());
    assert!(pool.handle("busy-app").is_some());

    let evicted = factory
        .producers()
        .into_iter()
        .find(|producer| producer.app() == "idle-app")
        .unwrap();
    assert!(!evicted.is_started());

    pool.stop().await;
}

#[tokio::test]
async fn failed_start_is_not_cached() {
    integration_test_utils::init_logging();

    let factory = Arc::new(TestBrokerFactory::new().failing_producer_start());
    let pool = ProducerPool::new(factory.clone(), ProducerConfig::default());
    pool.start().await.unwrap();

    let err = pool.get_or_create("shop").await.unwrap_err();
    assert!(matches!(err, GatewayError::ResourceCreation(_)));
    assert!(err.to_string().starts_with("get producer error, "));
    assert!(pool.is_empty());

    assert!(pool.get_or_create("shop").await.is_err());
    assert_eq!(factory.producers_created(), 2);

    pool.stop().await;
}

#[tokio::test]
async fn stop_shuts_down_every_client() {
    integration_test_utils::init_logging();

    let factory = Arc::new(TestBrokerFactory::new());
    let pool = ProducerPool::new(factory.clone(), ProducerConfig::default());

    assert!(matches!(
        pool.get_or_create("shop").await,
        Err(GatewayError::NotRunning(_))
    ));

    pool.start().await.unwrap();
    pool.get_or_create("shop").await.unwrap();
    pool.get_or_create("billing").await.unwrap();

    pool.will_stop().await;
    pool.stop().await;

    assert!(pool.is_empty());
    assert!(factory
        .producers()
        .iter()
        .all(|producer| !producer.is_started()));
}

#[tokio::test]
async fn serves_admitted_work_between_will_stop_and_stop() {
    integration_test_utils::init_logging();

    let factory = Arc::new(TestBrokerFactory::new());
    let pool = ProducerPool::new(factory.clone(), ProducerConfig::default());
    pool.start().await.unwrap();
    let shop = pool.get_or_create("shop").await.unwrap();

    pool.will_stop().await;
    let again = pool.get_or_create("shop").await.unwrap();
    assert!(Arc::ptr_eq(&shop, &again));
    pool.get_or_create("billing").await.unwrap();
    assert_eq!(factory.producers().len(), 2);

    pool.stop().await;
    assert!(matches!(
        pool.get_or_create("shop").await,
        Err(GatewayError::NotRunning(_))
    ));
    assert!(pool.is_empty());
    assert!(factory
        .producers()
        .iter()
        .all(|producer| !producer.is_started()));
}
