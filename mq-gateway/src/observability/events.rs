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

//! Canonical structured event names used across `mq-gateway`.

// Lifecycle transitions.
pub const LIFECYCLE_START_OK: &str = "lifecycle_start_ok";
pub const LIFECYCLE_START_FAILED: &str = "lifecycle_start_failed";
pub const LIFECYCLE_WILL_STOP: &str = "lifecycle_will_stop";
pub const LIFECYCLE_STOP_OK: &str = "lifecycle_stop_ok";

// Producer pool events.
pub const PRODUCER_CREATE: &str = "producer_create";
pub const PRODUCER_CREATE_FAILED: &str = "producer_create_failed";
pub const PRODUCER_EVICT_IDLE: &str = "producer_evict_idle";
pub const PRODUCER_SHUTDOWN: &str = "producer_shutdown";
pub const PRODUCER_IDLE_MONITOR_EXIT: &str = "producer_idle_monitor_exit";
pub const ALLOW_LIST_REPLACED: &str = "allow_list_replaced";
pub const ALLOW_LIST_EMPTY: &str = "allow_list_empty";

// Consumer pool and reconciliation events.
pub const CONSUMER_CREATE: &str = "consumer_create";
pub const CONSUMER_CREATE_FAILED: &str = "consumer_create_failed";
pub const CONSUMER_START_FAILED: &str = "consumer_start_failed";
pub const CONSUMER_SUBSCRIBE_OK: &str = "consumer_subscribe_ok";
pub const CONSUMER_SUBSCRIBE_FAILED: &str = "consumer_subscribe_failed";
pub const CONSUMER_UNSUBSCRIBE_OK: &str = "consumer_unsubscribe_ok";
pub const CONSUMER_UNSUBSCRIBE_FAILED: &str = "consumer_unsubscribe_failed";
pub const CONSUMER_LISTENER_REPLACED: &str = "consumer_listener_replaced";
pub const CONSUMER_RECONCILE_SUMMARY: &str = "consumer_reconcile_summary";
pub const CONSUMER_REMOVE: &str = "consumer_remove";
pub const CONSUMER_EVICT_IDLE: &str = "consumer_evict_idle";
pub const CONSUMER_IDLE_MONITOR_EXIT: &str = "consumer_idle_monitor_exit";
pub const CONSUMER_SHUTDOWN: &str = "consumer_shutdown";
pub const SUBSCRIPTION_DUPLICATE: &str = "subscription_duplicate";
pub const SUBSCRIPTION_SKIPPED_BLANK: &str = "subscription_skipped_blank";

// Delivery events.
pub const DELIVERY_NO_DISPATCHER: &str = "delivery_no_dispatcher";
pub const DELIVERY_BATCH_FAILED: &str = "delivery_batch_failed";
pub const CALLBACK_REQUEST: &str = "callback_request";
pub const CALLBACK_RESPONSE: &str = "callback_response";

// Produce path events.
pub const PRODUCE_REQUEST: &str = "produce_request";
pub const PRODUCE_RESPONSE: &str = "produce_response";
pub const PRODUCE_FAILED: &str = "produce_failed";
pub const PRODUCE_REJECTED_OVERLOAD: &str = "produce_rejected_overload";
pub const PRODUCE_SLOW_PUBLISH: &str = "produce_slow_publish";
pub const PRODUCE_SLOW_DISPATCH: &str = "produce_slow_dispatch";

// Runtime events.
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const RUNTIME_WORKER_EXIT: &str = "runtime_worker_exit";
pub const SUBSCRIPTION_SYNC_OK: &str = "subscription_sync_ok";
pub const SUBSCRIPTION_SYNC_FAILED: &str = "subscription_sync_failed";
pub const SUBSCRIPTION_SYNC_LOOP_EXIT: &str = "subscription_sync_loop_exit";
