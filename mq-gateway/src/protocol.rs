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

//! Produce request/response model and the HTTP header protocol.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

pub const HEADER_TOPIC: &str = "Topic";
pub const HEADER_APP: &str = "App";
pub const HEADER_REQUEST_ID: &str = "Request-ID";
pub const HEADER_CHARSET: &str = "Message-Charset";
pub const HEADER_ONE_WAY: &str = "One-Way";
pub const HEADER_DELAY_TIME_LEVEL: &str = "Delay-Time-Level";
pub const HEADER_ORDERLY_SHARDING_KEY: &str = "Orderly-Sharding-Key";
pub const HEADER_TAG: &str = "Tag";
pub const HEADER_KEY: &str = "Key";

/// The only method accepted for produce requests.
pub const WRITE_METHOD: &str = "POST";
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Fixed response status enumeration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    MethodNotSupported,
    Exception,
    TooManyRequests,
}

impl StatusCode {
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::MethodNotSupported => 405,
            StatusCode::Exception => 500,
            StatusCode::TooManyRequests => 501,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "bad request",
            StatusCode::MethodNotSupported => "only supported post",
            StatusCode::Exception => "exception occurred.",
            StatusCode::TooManyRequests => "too many request, please wait a moment.",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResponseStatus {
    pub code: u16,
    pub message: String,
}

impl ResponseStatus {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.code(),
            message: message.into(),
        }
    }

    /// Status carrying the default message for its code.
    pub fn of(status: StatusCode) -> Self {
        Self::new(status, status.default_message())
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok.code()
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum CharsetError {
    #[error("unsupported charset {0}")]
    Unsupported(String),
    #[error("content is not representable in {0}")]
    Unmappable(Charset),
}

/// Character sets accepted for request bodies and message payloads.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Charset {
    Utf8,
    UsAscii,
    Iso8859_1,
}

impl Charset {
    pub fn lookup(name: &str) -> Result<Self, CharsetError> {
        let normalized = name.trim().to_ascii_uppercase().replace('_', "-");
        match normalized.as_str() {
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "US-ASCII" | "ASCII" => Ok(Charset::UsAscii),
            "ISO-8859-1" | "ISO8859-1" | "LATIN1" => Ok(Charset::Iso8859_1),
            _ => Err(CharsetError::Unsupported(name.to_string())),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, CharsetError> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| CharsetError::Unmappable(self)),
            Charset::UsAscii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|b| char::from(*b)).collect())
                } else {
                    Err(CharsetError::Unmappable(self))
                }
            }
            Charset::Iso8859_1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, CharsetError> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::UsAscii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(CharsetError::Unmappable(self))
                }
            }
            Charset::Iso8859_1 => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| CharsetError::Unmappable(self)))
                .collect(),
        }
    }
}

impl Display for Charset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "UTF-8"),
            Charset::UsAscii => write!(f, "US-ASCII"),
            Charset::Iso8859_1 => write!(f, "ISO-8859-1"),
        }
    }
}

/// JSON body of a produce request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MessageContent {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// A decoded produce request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageProduceRequest {
    pub method: String,
    pub topic: Option<String>,
    pub app: Option<String>,
    pub request_id: Option<String>,
    pub charset: String,
    pub one_way: bool,
    pub delay_level: Option<String>,
    pub orderly_sharding_key: Option<String>,
    pub content: Option<MessageContent>,
    /// Gateway-assigned id used to correlate log records.
    pub internal_req_id: String,
    pub gateway_address: String,
}

impl Default for MessageProduceRequest {
    fn default() -> Self {
        Self {
            method: WRITE_METHOD.to_string(),
            topic: None,
            app: None,
            request_id: None,
            charset: DEFAULT_CHARSET.to_string(),
            one_way: false,
            delay_level: None,
            orderly_sharding_key: None,
            content: None,
            internal_req_id: Uuid::new_v4().to_string(),
            gateway_address: String::new(),
        }
    }
}

impl MessageProduceRequest {
    /// Decodes a request from its method, headers and raw body.
    ///
    /// Header names match case-insensitively. Values are trimmed and blank values
    /// count as absent, except `One-Way` which is a presence flag. A body that
    /// cannot be decoded with the requested charset or parsed as JSON leaves
    /// `content` empty so that validation reports it.
    pub fn decode<'a, I>(method: &str, headers: I, body: &[u8], gateway_address: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let headers: Vec<(&str, &str)> = headers.into_iter().collect();
        let header = |name: &str| -> Option<String> {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let charset = header(HEADER_CHARSET).unwrap_or_else(|| DEFAULT_CHARSET.to_string());
        let content = Charset::lookup(&charset)
            .and_then(|cs| cs.decode(body))
            .ok()
            .and_then(|text| serde_json::from_str::<MessageContent>(&text).ok());

        Self {
            method: method.to_string(),
            topic: header(HEADER_TOPIC),
            app: header(HEADER_APP),
            request_id: header(HEADER_REQUEST_ID),
            one_way: headers
                .iter()
                .any(|(key, _)| key.eq_ignore_ascii_case(HEADER_ONE_WAY)),
            delay_level: header(HEADER_DELAY_TIME_LEVEL),
            orderly_sharding_key: header(HEADER_ORDERLY_SHARDING_KEY),
            charset,
            content,
            internal_req_id: Uuid::new_v4().to_string(),
            gateway_address: gateway_address.to_string(),
        }
    }

    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or_default()
    }

    pub fn app(&self) -> &str {
        self.app.as_deref().unwrap_or_default()
    }

    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or_default()
    }

    pub fn body(&self) -> Option<&str> {
        self.content.as_ref().and_then(|content| content.body.as_deref())
    }

    pub fn tag(&self) -> Option<&str> {
        self.content.as_ref().and_then(|content| content.tag.as_deref())
    }

    pub fn key(&self) -> Option<&str> {
        self.content.as_ref().and_then(|content| content.key.as_deref())
    }
}

#[derive(Serialize)]
struct ResponseBody<'a> {
    status: &'a ResponseStatus,
    #[serde(rename = "msgId", skip_serializing_if = "Option::is_none")]
    msg_id: Option<&'a str>,
}

/// Outcome of one produce request, echoed back with the request's identity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageProduceResponse {
    pub topic: Option<String>,
    pub app: Option<String>,
    pub request_id: Option<String>,
    pub internal_req_id: String,
    pub charset: String,
    pub status: ResponseStatus,
    pub msg_id: Option<String>,
}

impl MessageProduceResponse {
    pub fn for_request(request: &MessageProduceRequest, status: ResponseStatus) -> Self {
        Self {
            topic: request.topic.clone(),
            app: request.app.clone(),
            request_id: request.request_id.clone(),
            internal_req_id: request.internal_req_id.clone(),
            charset: request.charset.clone(),
            status,
            msg_id: None,
        }
    }

    pub fn with_msg_id(mut self, msg_id: impl Into<String>) -> Self {
        self.msg_id = Some(msg_id.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// `{"status":{"code":..,"message":..},"msgId":..}`, `msgId` omitted when absent.
    pub fn to_body_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ResponseBody {
            status: &self.status,
            msg_id: self.msg_id.as_deref(),
        })
    }

    /// Body bytes in the request charset, falling back to UTF-8.
    pub fn encode_body(&self) -> serde_json::Result<Vec<u8>> {
        let json = self.to_body_json()?;
        Ok(Charset::lookup(&self.charset)
            .and_then(|cs| cs.encode(&json))
            .unwrap_or_else(|_| json.into_bytes()))
    }

    pub fn echo_headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_TOPIC, self.topic.clone().unwrap_or_default()),
            (HEADER_APP, self.app.clone().unwrap_or_default()),
            (HEADER_REQUEST_ID, self.request_id.clone().unwrap_or_default()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Charset, CharsetError, MessageProduceRequest, MessageProduceResponse, ResponseStatus,
        StatusCode,
    };

    const BODY: &[u8] = br#"{"tag":"t1","key":"k1","body":"hello"}"#;

    #[test]
    fn decode_reads_headers_case_insensitively_and_trims() {
        let request = MessageProduceRequest::decode(
            "POST",
            [
                ("topic", " orders "),
                ("APP", "app1"),
                ("request-id", "r-1"),
                ("Delay-Time-Level", "3"),
                ("Orderly-Sharding-Key", "   "),
            ],
            BODY,
            "10.0.0.1",
        );

        assert_eq!(request.topic(), "orders");
        assert_eq!(request.app(), "app1");
        assert_eq!(request.request_id(), "r-1");
        assert_eq!(request.delay_level.as_deref(), Some("3"));
        assert_eq!(request.orderly_sharding_key, None);
        assert!(!request.one_way);
        assert_eq!(request.charset, "UTF-8");
        assert_eq!(request.body(), Some("hello"));
        assert_eq!(request.tag(), Some("t1"));
        assert_eq!(request.key(), Some("k1"));
        assert_eq!(request.gateway_address, "10.0.0.1");
        assert!(!request.internal_req_id.is_empty());
    }

    #[test]
    fn one_way_is_a_presence_flag() {
        let request = MessageProduceRequest::decode("POST", [("One-Way", "")], BODY, "gw");
        assert!(request.one_way);
    }

    #[test]
    fn malformed_body_leaves_content_empty() {
        let request = MessageProduceRequest::decode("POST", [("Topic", "t")], b"not json", "gw");
        assert_eq!(request.content, None);

        let request = MessageProduceRequest::decode(
            "POST",
            [("Message-Charset", "KOI8-R")],
            BODY,
            "gw",
        );
        assert_eq!(request.content, None);
    }

    #[test]
    fn latin1_body_decodes_with_requested_charset() {
        let body = b"{\"body\":\"caf\xe9\"}";
        let request =
            MessageProduceRequest::decode("POST", [("Message-Charset", "ISO-8859-1")], body, "gw");
        assert_eq!(request.body(), Some("café"));
    }

    #[test]
    fn charset_rejects_unmappable_text() {
        assert_eq!(
            Charset::UsAscii.encode("café"),
            Err(CharsetError::Unmappable(Charset::UsAscii))
        );
        assert_eq!(Charset::Iso8859_1.encode("café"), Ok(b"caf\xe9".to_vec()));
        assert!(matches!(
            Charset::lookup("EBCDIC"),
            Err(CharsetError::Unsupported(_))
        ));
    }

    #[test]
    fn response_body_omits_absent_msg_id() {
        let request = MessageProduceRequest {
            topic: Some("orders".to_string()),
            app: Some("app1".to_string()),
            ..MessageProduceRequest::default()
        };

        let response =
            MessageProduceResponse::for_request(&request, ResponseStatus::of(StatusCode::BadRequest));
        assert_eq!(
            response.to_body_json().unwrap(),
            r#"{"status":{"code":400,"message":"bad request"}}"#
        );
        assert_eq!(response.echo_headers()[2], ("Request-ID", String::new()));

        let response =
            MessageProduceResponse::for_request(&request, ResponseStatus::new(StatusCode::Ok, "SEND_OK"))
                .with_msg_id("m-1");
        assert_eq!(
            response.to_body_json().unwrap(),
            r#"{"status":{"code":200,"message":"SEND_OK"},"msgId":"m-1"}"#
        );
    }
}
