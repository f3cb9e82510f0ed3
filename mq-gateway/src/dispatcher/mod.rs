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

//! Request-handling front end.
//!
//! A decoded [`MessageProduceRequest`](crate::protocol::MessageProduceRequest) is
//! validated, checked against the publish allow-list, then handed to a fixed pool
//! of worker threads through a bounded queue. A full queue is answered at once
//! with `TOO_MANY_REQ`.

pub mod admission;
pub mod processor;
pub mod validator;

pub use admission::Dispatcher;
