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

//! Deterministic queue selection for ordered publishes.

use crate::broker::MessageQueue;

/// 32-bit polynomial hash over UTF-16 code units, multiplier 31.
pub fn stable_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

pub fn shard_index(key: &str, queue_count: usize) -> Option<usize> {
    if queue_count == 0 {
        return None;
    }
    let hash = usize::try_from(stable_hash(key).unsigned_abs()).ok()?;
    Some(hash % queue_count)
}

pub fn select_queue<'a>(queues: &'a [MessageQueue], key: &str) -> Option<&'a MessageQueue> {
    shard_index(key, queues.len()).and_then(|index| queues.get(index))
}
