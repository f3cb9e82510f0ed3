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

//! Control-plane layer.
//!
//! Owns the per-application broker client registries and their lifecycle:
//! lazy creation, idle eviction and subscription reconciliation. Every mutation
//! for one application is serialized through that application's entry in a
//! [`keyed_mutex::KeyedMutex`].

pub mod consumer_handle;
pub mod consumer_pool;
pub mod keyed_mutex;
pub mod producer_pool;
