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

//! Data-plane layer.
//!
//! Moves broker-delivered batches to subscriber callbacks: the batch router splits
//! a mixed batch by topic and each callback dispatcher posts its sub-batch one
//! message at a time.

pub mod batch_router;
pub mod callback_dispatcher;
