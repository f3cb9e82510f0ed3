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

//! Routing layer: subscription model, desired-set reconciliation, publish
//! allow-list and ordered-queue selection.
//!
//! ```
//! use mq_gateway::routing::reconciler::diff;
//! use mq_gateway::routing::subscription::Subscription;
//!
//! let old = vec![Subscription::new("app1", "topicA", "t1", "http://x/1")];
//! let new = vec![
//!     Subscription::new("app1", "topicA", "t2", "http://x/1"),
//!     Subscription::new("app1", "topicB", "*", "http://x/2"),
//! ];
//!
//! let delta = diff(&old, &new);
//! assert_eq!(delta.changed_topics(), vec!["topicA"]);
//! assert_eq!(delta.added_topics(), vec!["topicB"]);
//! assert!(delta.removed.is_empty());
//! ```

pub mod allow_list;
pub mod queue_selector;
pub mod reconciler;
pub mod subscription;
