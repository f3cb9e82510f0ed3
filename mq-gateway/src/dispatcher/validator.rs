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

//! Request shape checks and the publish allow-list gate.

use crate::error::ValidationError;
use crate::protocol::{
    MessageProduceRequest, HEADER_APP, HEADER_DELAY_TIME_LEVEL, HEADER_ONE_WAY,
    HEADER_ORDERLY_SHARDING_KEY, HEADER_REQUEST_ID, HEADER_TOPIC, WRITE_METHOD,
};
use crate::routing::allow_list::PublishAllowList;

const BODY_REQUIRED: &str =
    "HTTP body required, maybe you not set or its json format invalid and or charset error.";
const CONTENT_REQUIRED: &str = "message content required.";

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

/// Checks method, required headers, header formats and body presence.
pub fn validate(request: &MessageProduceRequest) -> Result<(), ValidationError> {
    if request.method != WRITE_METHOD {
        return Err(ValidationError::method_not_supported(&request.method));
    }

    for (header, value) in [
        (HEADER_TOPIC, request.topic.as_deref()),
        (HEADER_APP, request.app.as_deref()),
        (HEADER_REQUEST_ID, request.request_id.as_deref()),
    ] {
        if is_blank(value) {
            return Err(ValidationError::missing_header(header));
        }
    }

    if let Some(level) = request.delay_level.as_deref() {
        if level.trim().parse::<i32>().is_err() {
            return Err(ValidationError::bad_request(format!(
                "HEADER[{HEADER_DELAY_TIME_LEVEL}] must be int."
            )));
        }
    }

    if request.one_way && request.orderly_sharding_key.is_some() {
        return Err(ValidationError::bad_request(format!(
            "HEADER[{HEADER_ONE_WAY}] and HEADER[{HEADER_ORDERLY_SHARDING_KEY}] are mutually exclusive."
        )));
    }

    if request.content.is_none() {
        return Err(ValidationError::bad_request(BODY_REQUIRED));
    }

    if is_blank(request.body()) {
        return Err(ValidationError::bad_request(CONTENT_REQUIRED));
    }

    Ok(())
}

/// Rejects pairs that were not provisioned to publish.
pub fn check_allow_list(
    request: &MessageProduceRequest,
    allow_list: &PublishAllowList,
) -> Result<(), ValidationError> {
    if allow_list.contains(request.app(), request.topic()) {
        return Ok(());
    }
    Err(ValidationError::bad_request(format!(
        "subscription[app: {}, topic: {}] is not found.",
        request.app(),
        request.topic()
    )))
}
