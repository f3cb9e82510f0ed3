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

//! Event names emitted by the gateway process.

pub const PROCESS_START: &str = "process_start";
pub const PROCESS_LISTENING: &str = "process_listening";
pub const PROCESS_SHUTDOWN_REQUESTED: &str = "process_shutdown_requested";
pub const PROCESS_SIGNAL_FAILED: &str = "process_signal_failed";
pub const PROCESS_STOPPED: &str = "process_stopped";

pub const HTTP_REQUEST_DECODED: &str = "http_request_decoded";
pub const HTTP_RESPONSE_FAILED: &str = "http_response_failed";

pub const CALLBACK_HTTP_FAILED: &str = "callback_http_failed";
