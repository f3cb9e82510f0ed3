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

mod config;
mod events;
mod http_callback;
mod http_server;

use crate::config::{BrokerConfig, BrokerMode, Config, SubscriptionProviderMode};
use crate::http_callback::HttpCallbackTransport;
use anyhow::Context;
use clap::Parser;
use loopback_broker::LoopbackBroker;
use mq_gateway::broker::BrokerClientFactory;
use mq_gateway::runtime::subscription_sync::SubscriptionProvider;
use mq_gateway::Gateway;
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subscription_static_file::SubscriptionStaticFile;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const COMPONENT: &str = "configurable_gateway";

#[derive(Parser)]
#[command()]
struct GatewayArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    info!(
        event = events::PROCESS_START,
        component = COMPONENT,
        "Started configurable-gateway"
    );

    let args = GatewayArgs::parse();
    let mut file = File::open(&args.config)
        .with_context(|| format!("unable to open config file {}", args.config))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .with_context(|| format!("unable to read config file {}", args.config))?;
    let config = Config::from_json5(&contents)
        .with_context(|| format!("unable to parse config file {}", args.config))?;
    config.validate()?;

    let broker = broker_factory(&config.broker)?;
    let provider: Arc<dyn SubscriptionProvider> = match config.subscription_provider.mode {
        SubscriptionProviderMode::StaticFile => Arc::new(SubscriptionStaticFile::new(
            config.subscription_provider.file_path.clone(),
        )),
    };
    let callbacks = Arc::new(
        HttpCallbackTransport::new(&config.callback_http)
            .context("unable to build callback http client")?,
    );

    let gateway = Arc::new(Gateway::new(
        config.gateway.clone(),
        broker,
        callbacks,
        provider,
    )?);
    gateway.start().await?;

    let ip: IpAddr = config
        .server
        .listen_address
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.listen_address))?;
    let addr = SocketAddr::new(ip, config.server.listen_port);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            gateway.stop().await;
            return Err(err).with_context(|| format!("unable to bind {addr}"));
        }
    };
    info!(
        event = events::PROCESS_LISTENING,
        component = COMPONENT,
        addr = %addr,
        "configurable-gateway listening"
    );

    let served = http_server::serve(
        listener,
        gateway.clone(),
        config.server.max_body_bytes,
        shutdown_signal(gateway.clone()),
    )
    .await;

    gateway.stop().await;
    info!(
        event = events::PROCESS_STOPPED,
        component = COMPONENT,
        "configurable-gateway stopped"
    );
    served.context("http server failed")
}

fn broker_factory(config: &BrokerConfig) -> anyhow::Result<Arc<dyn BrokerClientFactory>> {
    match config.mode {
        BrokerMode::Loopback => Ok(LoopbackBroker::with_queues(config.queues_per_topic)),
        BrokerMode::Rocketmq => anyhow::bail!(
            "broker mode 'rocketmq' (name server {}) is not integrated in this build",
            config.name_server_address.as_deref().unwrap_or("<unset>")
        ),
    }
}

async fn shutdown_signal(gateway: Arc<Gateway>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            event = events::PROCESS_SIGNAL_FAILED,
            component = COMPONENT,
            err = %err,
            "unable to listen for shutdown signal"
        );
    }
    info!(
        event = events::PROCESS_SHUTDOWN_REQUESTED,
        component = COMPONENT,
        "shutdown requested, draining"
    );
    gateway.will_stop().await;
}
