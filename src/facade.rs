//! # Request façade
//!
//! Four-verb wrapper over the versioned REST API. Every call carries the
//! session token as `Authorization: Bearer <token>`, is recorded in an
//! in-memory request log, and resolves with the parsed body only when the
//! server answers exactly 200. Any other status becomes [`Error::Http`] with
//! the full status and body; nothing is retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    config::Config,
    error::{Error, Result},
    session::Session,
};

/// A non-200 response, kept whole for the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// One entry of the request log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub data: Value,
}

/// Where a request goes and whether it is authenticated.
struct Target<'a> {
    method: Method,
    url: String,
    label: &'a str,
    authenticated: bool,
}

pub struct RequestFacade {
    client: Client,
    version: String,
    base_url: String,
    session: Arc<Session>,
    logs: Mutex<Vec<LogEntry>>,
}

impl RequestFacade {
    pub fn new(config: &Config, session: Arc<Session>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            version: config.version.trim_end_matches('/').to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            logs: Mutex::new(Vec::new()),
        })
    }

    /// The versioned API root every `uri` is appended to.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn get(&self, uri: &str, params: Option<Value>) -> Result<Value> {
        self.execute(self.versioned(Method::GET, uri), params, None).await
    }

    pub async fn post(&self, uri: &str, body: Option<Value>) -> Result<Value> {
        self.execute(self.versioned(Method::POST, uri), None, body).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Result<Value> {
        self.execute(self.versioned(Method::PUT, uri), None, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Result<Value> {
        self.execute(self.versioned(Method::DELETE, uri), None, None).await
    }

    /// Unauthenticated POST to a fixed path on the host, outside the versioned API.
    pub async fn post_unversioned(&self, path: &str, body: Value) -> Result<Value> {
        let target = Target {
            method: Method::POST,
            url: format!("{}{}", self.base_url, path),
            label: path,
            authenticated: false,
        };
        self.execute(target, None, Some(body)).await
    }

    /// Snapshot of the request log.
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().await.clone()
    }

    fn versioned<'a>(&self, method: Method, uri: &'a str) -> Target<'a> {
        Target {
            method,
            url: format!("{}{}", self.version, uri),
            label: uri,
            authenticated: true,
        }
    }

    async fn log(&self, level: &str, message: String, data: Value) {
        debug!(%message, "api");
        self.logs.lock().await.push(LogEntry {
            time: Utc::now(),
            level: level.to_string(),
            message,
            data,
        });
    }

    async fn execute(
        &self,
        target: Target<'_>,
        params: Option<Value>,
        body: Option<Value>,
    ) -> Result<Value> {
        self.log(
            "stdout",
            format!("[{}] {}", target.method, target.label),
            body.clone().unwrap_or(Value::Null),
        )
        .await;

        let mut request = self
            .client
            .request(target.method.clone(), &target.url)
            .header(header::CONTENT_TYPE, "application/json");
        if target.authenticated {
            if let Some(token) = self.session.token().await {
                request = request.bearer_auth(token);
            }
        }
        if let Some(params) = &params {
            request = request.query(params);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.log("stderr", format!("[API] {} : {}", target.label, e), Value::Null)
                    .await;
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        self.log(
            "stdout",
            format!("[API] {} : {}", target.label, status),
            serde_json::json!({ "status": status, "body": body }),
        )
        .await;

        if status == 200 {
            Ok(body)
        } else {
            Err(Error::Http(Box::new(ApiResponse { status, body })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_targets_join_uri() {
        let config = Config::new("http://host:3200").version("http://host:3200/api/v1/");
        let facade = RequestFacade::new(&config, Arc::new(Session::default())).unwrap();
        let target = facade.versioned(Method::GET, "/library/main");
        assert_eq!(target.url, "http://host:3200/api/v1/library/main");
        assert!(target.authenticated);
    }

    #[tokio::test]
    async fn log_starts_empty() {
        let facade = RequestFacade::new(&Config::default(), Arc::new(Session::default())).unwrap();
        assert!(facade.logs().await.is_empty());
    }
}
