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

//! Publish allow-list of provisioned `app:topic` pairs.

use crate::observability::events;
use crate::routing::subscription::Subscription;
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "allow_list";

pub fn allow_list_key(app: &str, topic: &str) -> String {
    format!("{app}:{topic}")
}

/// Set of pairs allowed to publish, replaced wholesale on every sync.
pub struct PublishAllowList {
    entries: ArcSwap<HashSet<String>>,
}

impl Default for PublishAllowList {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashSet::new()),
        }
    }
}

impl PublishAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in the pairs of `records`; blank apps or topics are ignored.
    pub fn replace(&self, records: &[Subscription]) -> usize {
        let next: HashSet<String> = records
            .iter()
            .filter(|record| !record.app.trim().is_empty() && !record.topic.trim().is_empty())
            .map(|record| allow_list_key(&record.app, &record.topic))
            .collect();

        if next.is_empty() {
            warn!(
                event = events::ALLOW_LIST_EMPTY,
                component = COMPONENT,
                "No subscription."
            );
        }

        let size = next.len();
        self.entries.store(Arc::new(next));
        debug!(
            event = events::ALLOW_LIST_REPLACED,
            component = COMPONENT,
            size,
            "publish allow-list replaced"
        );
        size
    }

    pub fn contains(&self, app: &str, topic: &str) -> bool {
        self.entries.load().contains(&allow_list_key(app, topic))
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}
