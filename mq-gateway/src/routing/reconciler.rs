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

//! Delta computation between an active and a desired subscription set.

use crate::routing::subscription::Subscription;
use std::collections::BTreeMap;

/// What must change to move one application from its old to its new set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubscriptionDelta {
    /// Topics only present in the new set.
    pub added: Vec<Subscription>,
    /// Topics only present in the old set.
    pub removed: Vec<Subscription>,
    /// Topics present in both with a different tag or callback, as `(old, new)`.
    pub changed: Vec<(Subscription, Subscription)>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn added_topics(&self) -> Vec<&str> {
        self.added.iter().map(|s| s.topic.as_str()).collect()
    }

    pub fn removed_topics(&self) -> Vec<&str> {
        self.removed.iter().map(|s| s.topic.as_str()).collect()
    }

    pub fn changed_topics(&self) -> Vec<&str> {
        self.changed
            .iter()
            .map(|(old, _)| old.topic.as_str())
            .collect()
    }
}

/// Computes the delta keyed by topic. Output is ordered by topic.
pub fn diff<'a, O, N>(old: O, new: N) -> SubscriptionDelta
where
    O: IntoIterator<Item = &'a Subscription>,
    N: IntoIterator<Item = &'a Subscription>,
{
    let old: BTreeMap<&str, &Subscription> = old
        .into_iter()
        .map(|subscription| (subscription.topic.as_str(), subscription))
        .collect();
    let new: BTreeMap<&str, &Subscription> = new
        .into_iter()
        .map(|subscription| (subscription.topic.as_str(), subscription))
        .collect();

    let mut delta = SubscriptionDelta::default();

    for (topic, previous) in &old {
        match new.get(topic) {
            Some(next) if !previous.same_binding(next) => {
                delta.changed.push(((*previous).clone(), (*next).clone()));
            }
            Some(_) => {}
            None => delta.removed.push((*previous).clone()),
        }
    }

    delta.added = new
        .iter()
        .filter(|(topic, _)| !old.contains_key(*topic))
        .map(|(_, next)| (*next).clone())
        .collect();

    delta
}

#[cfg(test)]
mod tests {
    use super::diff;
    use crate::routing::subscription::Subscription;

    #[test]
    fn identical_sets_produce_empty_delta() {
        let set = vec![
            Subscription::new("app1", "topicA", "t1", "http://x/1"),
            Subscription::new("app1", "topicB", "*", "http://x/2"),
        ];
        assert!(diff(&set, &set).is_empty());
    }

    #[test]
    fn tag_or_callback_change_is_reported_as_changed() {
        let old = vec![
            Subscription::new("app1", "topicA", "t1", "http://x/1"),
            Subscription::new("app1", "topicB", "t1", "http://x/1"),
        ];
        let new = vec![
            Subscription::new("app1", "topicA", "t2", "http://x/1"),
            Subscription::new("app1", "topicB", "t1", "http://x/9"),
        ];

        let delta = diff(&old, &new);
        assert_eq!(delta.changed_topics(), vec!["topicA", "topicB"]);
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(delta.changed[0].1.tag.as_str(), "t2");
    }

    #[test]
    fn missing_topics_are_removed_and_new_topics_added() {
        let old = vec![Subscription::new("app1", "topicA", "*", "http://x/1")];
        let new = vec![Subscription::new("app1", "topicC", "*", "http://x/3")];

        let delta = diff(&old, &new);
        assert_eq!(delta.removed_topics(), vec!["topicA"]);
        assert_eq!(delta.added_topics(), vec!["topicC"]);
        assert!(delta.changed.is_empty());
    }

    #[test]
    fn wildcard_and_blank_tag_are_equivalent() {
        let old = vec![Subscription::new("app1", "topicA", "*", "http://x/1")];
        let new = vec![Subscription::new("app1", "topicA", "", "http://x/1")];
        assert!(diff(&old, &new).is_empty());
    }
}
