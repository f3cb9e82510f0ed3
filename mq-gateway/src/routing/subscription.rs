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

//! Subscription records and desired-set grouping.

use crate::observability::events;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use tracing::warn;

const COMPONENT: &str = "subscription";

/// Wildcard tag accepted from provisioning records.
pub const TAG_ALL: &str = "*";
const TAG_ALTERNATIVE_SEPARATOR: &str = "||";

/// Tag filter of one consumer subscription.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[serde(from = "Option<String>", into = "String")]
pub enum TagExpression {
    #[default]
    All,
    Expr(String),
}

impl TagExpression {
    /// A blank tag or `*` selects every tag.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(TAG_ALL) => TagExpression::All,
            Some(expr) => TagExpression::Expr(expr.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TagExpression::All => TAG_ALL,
            TagExpression::Expr(expr) => expr,
        }
    }

    /// Matches a message tag against `a || b` style alternatives.
    pub fn matches(&self, tag: Option<&str>) -> bool {
        match self {
            TagExpression::All => true,
            TagExpression::Expr(expr) => tag.is_some_and(|tag| {
                expr.split(TAG_ALTERNATIVE_SEPARATOR)
                    .any(|alternative| alternative.trim() == tag)
            }),
        }
    }
}

impl From<Option<String>> for TagExpression {
    fn from(raw: Option<String>) -> Self {
        Self::parse(raw.as_deref())
    }
}

impl From<TagExpression> for String {
    fn from(tag: TagExpression) -> Self {
        tag.as_str().to_string()
    }
}

impl Display for TagExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One provisioned `(app, topic)` pair. Producer records leave `tag` and
/// `callback` at their defaults.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Subscription {
    pub app: String,
    pub topic: String,
    #[serde(default)]
    pub tag: TagExpression,
    #[serde(default)]
    pub callback: String,
}

impl Subscription {
    pub fn new(app: &str, topic: &str, tag: &str, callback: &str) -> Self {
        Self {
            app: app.to_string(),
            topic: topic.to_string(),
            tag: TagExpression::parse(Some(tag)),
            callback: callback.to_string(),
        }
    }

    pub fn publisher(app: &str, topic: &str) -> Self {
        Self {
            app: app.to_string(),
            topic: topic.to_string(),
            tag: TagExpression::All,
            callback: String::new(),
        }
    }

    /// Tag and callback equality for one `(app, topic)` identity.
    pub fn same_binding(&self, other: &Subscription) -> bool {
        self.tag == other.tag && self.callback == other.callback
    }
}

impl Display for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "subscription[app: {}, topic: {}, tag: {}, callback: {}]",
            self.app, self.topic, self.tag, self.callback
        )
    }
}

/// Desired subscriptions per application, each list unique by topic.
pub type DesiredSubscriptions = BTreeMap<String, Vec<Subscription>>;

/// Groups a provisioning snapshot by application.
///
/// Records with a blank app are dropped. A repeated `(app, topic)` keeps the last
/// record in the position of the first.
pub fn group_by_app(records: Vec<Subscription>) -> DesiredSubscriptions {
    let mut grouped = DesiredSubscriptions::new();

    for record in records {
        if record.app.trim().is_empty() {
            warn!(
                event = events::SUBSCRIPTION_SKIPPED_BLANK,
                component = COMPONENT,
                topic = record.topic.as_str(),
                "skipping subscription without app"
            );
            continue;
        }

        let subscriptions = grouped.entry(record.app.clone()).or_default();
        match subscriptions
            .iter_mut()
            .find(|existing| existing.topic == record.topic)
        {
            Some(existing) => {
                warn!(
                    event = events::SUBSCRIPTION_DUPLICATE,
                    component = COMPONENT,
                    app = record.app.as_str(),
                    topic = record.topic.as_str(),
                    "duplicate subscription, keeping the last record"
                );
                *existing = record;
            }
            None => subscriptions.push(record),
        }
    }

    grouped
}
