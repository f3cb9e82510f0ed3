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

use crate::events;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use mq_gateway::protocol::{MessageProduceRequest, MessageProduceResponse};
use mq_gateway::Gateway;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

const COMPONENT: &str = "http_server";

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
}

/// Every path and method lands on the produce handler; the gateway decides what is valid.
pub fn router(gateway: Arc<Gateway>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(handle_produce)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(AppState { gateway })
}

pub async fn serve<F>(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    max_body_bytes: usize,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(gateway, max_body_bytes))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_produce(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let pairs: Vec<(&str, &str)> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect();
    let request = MessageProduceRequest::decode(
        method.as_str(),
        pairs,
        &body,
        state.gateway.gateway_address(),
    );
    log_decoded(&request, body.len());

    let response = state.gateway.dispatch(request).await;
    into_http_response(&response)
}

fn log_decoded(request: &MessageProduceRequest, body_bytes: usize) {
    debug!(
        event = events::HTTP_REQUEST_DECODED,
        component = COMPONENT,
        internal_req_id = request.internal_req_id.as_str(),
        method = request.method.as_str(),
        body_bytes,
        "decoded produce request"
    );
}

/// The HTTP status is always 200; the outcome travels in the JSON body.
fn into_http_response(response: &MessageProduceResponse) -> Response {
    let body = match response.encode_body() {
        Ok(body) => body,
        Err(err) => {
            error!(
                event = events::HTTP_RESPONSE_FAILED,
                component = COMPONENT,
                internal_req_id = response.internal_req_id.as_str(),
                err = %err,
                "unable to encode response body"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Ok(content_type) =
        HeaderValue::from_str(&format!("application/json;charset={}", response.charset))
    {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    for (name, value) in response.echo_headers() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, value);
        }
    }

    match builder.body(Body::from(body)) {
        Ok(response) => response,
        Err(err) => {
            error!(
                event = events::HTTP_RESPONSE_FAILED,
                component = COMPONENT,
                internal_req_id = response.internal_req_id.as_str(),
                err = %err,
                "unable to build http response"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{into_http_response, log_decoded, serve};
    use crate::config::CallbackHttpConfig;
    use crate::http_callback::HttpCallbackTransport;
    use loopback_broker::LoopbackBroker;
    use mq_gateway::protocol::{MessageProduceRequest, MessageProduceResponse, ResponseStatus, StatusCode};
    use mq_gateway::{Gateway, GatewayConfig};
    use std::io;
    use std::sync::{Arc, Mutex};
    use subscription_static_file::SubscriptionStaticFile;
    use tokio::sync::oneshot;

    const SUBSCRIPTIONS: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../utils/subscription-static-file/static-configs/testdata.json5"
    );

    #[test]
    fn response_echoes_request_identity() {
        let request = MessageProduceRequest::decode(
            "POST",
            [("Topic", "orders"), ("App", "shop"), ("Request-ID", "r-9")],
            b"{}",
            "10.0.0.1",
        );
        let response = MessageProduceResponse::for_request(
            &request,
            ResponseStatus::new(StatusCode::BadRequest, "nope"),
        );

        let http = into_http_response(&response);

        assert_eq!(http.status(), axum::http::StatusCode::OK);
        let headers = http.headers();
        assert_eq!(headers["Topic"], "orders");
        assert_eq!(headers["App"], "shop");
        assert_eq!(headers["Request-ID"], "r-9");
        assert_eq!(headers["content-type"], "application/json;charset=UTF-8");
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn decoded_request_event_carries_event_and_component() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let request = MessageProduceRequest::decode("POST", [("Topic", "orders")], b"{}", "10.0.0.1");

        tracing::subscriber::with_default(subscriber, || log_decoded(&request, 2));

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("http_request_decoded"), "{output}");
        assert!(output.contains("component=\"http_server\""), "{output}");
        assert!(output.contains(&request.internal_req_id), "{output}");
    }

    async fn started_gateway() -> Arc<Gateway> {
        let callbacks = HttpCallbackTransport::new(&CallbackHttpConfig::default()).unwrap();
        let gateway = Gateway::new(
            GatewayConfig::default(),
            LoopbackBroker::new(),
            Arc::new(callbacks),
            Arc::new(SubscriptionStaticFile::new(SUBSCRIPTIONS)),
        )
        .unwrap();
        gateway.start().await.unwrap();
        Arc::new(gateway)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn produce_over_http() {
        let gateway = started_gateway().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, gateway.clone(), 1024, async move {
            let _ = stop_rx.await;
        }));

        let client = reqwest::Client::new();
        let accepted = client
            .post(format!("http://{addr}/"))
            .header("Topic", "orders")
            .header("App", "shop")
            .header("Request-ID", "req-1")
            .body(r#"{"tag":"paid","body":"hello"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(accepted.status(), reqwest::StatusCode::OK);
        assert_eq!(accepted.headers()["Request-ID"], "req-1");
        let body = accepted.text().await.unwrap();
        assert!(body.contains(r#""code":200"#), "{body}");

        let unknown = client
            .post(format!("http://{addr}/"))
            .header("Topic", "orders")
            .header("App", "nobody")
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), reqwest::StatusCode::OK);
        assert!(unknown.text().await.unwrap().contains(r#""code":400"#));

        let too_large = client
            .post(format!("http://{addr}/"))
            .header("Topic", "orders")
            .header("App", "shop")
            .body(vec![b'x'; 4096])
            .send()
            .await
            .unwrap();
        assert_eq!(too_large.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

        let _ = stop_tx.send(());
        server.await.unwrap().unwrap();
        gateway.will_stop().await;
        gateway.stop().await;
    }
}
