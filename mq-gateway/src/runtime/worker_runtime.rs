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

//! Named worker threads, each driving one loop on its own current-thread runtime.

use crate::observability::events;
use std::future::Future;
use std::io;
use std::thread;
use tokio::runtime::Builder;
use tracing::{debug, error, warn};

const COMPONENT: &str = "worker_runtime";

/// Owning handle of one spawned worker thread.
pub struct WorkerThread {
    thread_name: String,
    join: thread::JoinHandle<()>,
}

impl WorkerThread {
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

/// Spawns `thread_name` and blocks it on the future built by `run_loop`.
///
/// The future is created on the worker thread, so it does not need to be `Send`.
pub fn spawn_worker_loop<F, Fut>(thread_name: String, run_loop: F) -> io::Result<WorkerThread>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let name_for_thread = thread_name.clone();
    let join = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(
                        event = events::RUNTIME_SPAWN_FAILED,
                        component = COMPONENT,
                        worker_thread = name_for_thread.as_str(),
                        err = %err,
                        "unable to build worker runtime"
                    );
                    return;
                }
            };
            runtime.block_on(run_loop());
        })?;

    debug!(
        event = events::RUNTIME_SPAWN_OK,
        component = COMPONENT,
        worker_thread = thread_name.as_str(),
        "worker thread spawned"
    );

    Ok(WorkerThread { thread_name, join })
}

/// Joins worker threads off the async executor.
pub async fn join_workers(workers: Vec<WorkerThread>) {
    let joined = tokio::task::spawn_blocking(move || {
        for worker in workers {
            if worker.join.join().is_err() {
                warn!(
                    event = events::RUNTIME_WORKER_EXIT,
                    component = COMPONENT,
                    worker_thread = worker.thread_name.as_str(),
                    "worker thread panicked"
                );
            }
        }
    })
    .await;

    if let Err(err) = joined {
        warn!(
            event = events::RUNTIME_WORKER_EXIT,
            component = COMPONENT,
            err = %err,
            "unable to join worker threads"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{join_workers, spawn_worker_loop};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn worker_runs_loop_on_named_thread() {
        let ran_on_named_thread = Arc::new(AtomicBool::new(false));
        let flag = ran_on_named_thread.clone();

        let worker = spawn_worker_loop("gw-test-worker".to_string(), move || async move {
            tokio::task::yield_now().await;
            let on_named = std::thread::current().name() == Some("gw-test-worker");
            flag.store(on_named, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(worker.thread_name(), "gw-test-worker");
        join_workers(vec![worker]).await;
        assert!(ran_on_named_thread.load(Ordering::SeqCst));
    }
}
