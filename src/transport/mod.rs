//! HTTP transport seam.
//!
//! Everything above this module talks to the device through the
//! [`Transport`] trait, so caches and the status poller can be exercised
//! against an in-process fake while production uses
//! [`ReqwestTransport`] wrapped in a [`TimeoutTransport`].
//!
//! Transports only move bytes. Retry, caching and decoding live in the
//! layers above.

pub mod http;
pub mod timeout;

pub use http::ReqwestTransport;
pub use timeout::{DEFAULT_TIMEOUT, TimeoutTransport};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{AdapterError, Result};

/// HTTP method used by the device API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request against the device, relative to its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path starting with `/`, e.g. `/status`.
    pub path: String,
    /// Form fields sent as `application/x-www-form-urlencoded` (POST only).
    pub form: Vec<(String, String)>,
}

impl Request {
    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            form: Vec::new(),
        }
    }

    /// Create a POST request with form fields.
    pub fn post_form(path: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            form,
        }
    }
}

/// A raw device response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status code is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`AdapterError::Api`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let text = String::from_utf8_lossy(&self.body);
        let message = text.trim();
        Err(AdapterError::Api {
            status: self.status,
            message: if message.is_empty() {
                format!("HTTP {}", self.status)
            } else {
                message.chars().take(200).collect()
            },
        })
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that can deliver a [`Request`] to the device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the raw response.
    ///
    /// Non-2xx statuses are returned as responses, not errors; only
    /// failures to complete the exchange are errors.
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}
