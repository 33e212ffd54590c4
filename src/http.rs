// Copyright 2026 The Matrix TUI Engine Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The HTTP client contract (§6), expressed as a trait so the sync loop
//! and work queue depend on an interface rather than `reqwest` directly,
//! with [`ReqwestHttpClient`] as the runnable default — mirroring
//! `response_init`/`response_perform`/`get_headers` in `libmatrix_src/api.c`.
//!
//! `response_perform` tracks every in-flight `CURL*` handle on a shared
//! transfer list and wakes each one from another thread with
//! `curl_multi_wakeup` when `matrix_cancel` fires. `reqwest::blocking`
//! exposes no equivalent: once a request is sent there is no handle to
//! interrupt. Cancellation here is therefore cooperative only — checked
//! before a request is issued, not during one in flight — and bounded by
//! the request's own timeout rather than an explicit wakeup. This is a
//! deliberate divergence from the source, recorded in DESIGN.md.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::SyncError;

/// A status code and parsed JSON body, the two things every caller of
/// [`HttpClient`] needs.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    /// Success is exactly status 200, per §6.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// A handle another thread can use to request cancellation, matching the
/// transfer list's wakeup role — cooperative here rather than a true
/// cross-thread interrupt (see module docs).
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        CancelHandle::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The HTTP contract the sync loop and work queue require: GET/POST/PUT,
/// bearer auth, JSON bodies, a status code, and cooperative cancellation.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, bearer: Option<&str>, timeout: Duration) -> Result<HttpResponse, SyncError>;

    fn post(&self, url: &str, bearer: Option<&str>, body: &Value, timeout: Duration) -> Result<HttpResponse, SyncError>;

    fn put(&self, url: &str, bearer: Option<&str>, body: &Value, timeout: Duration) -> Result<HttpResponse, SyncError>;

    /// A handle this client's caller can use to request cancellation; the
    /// client itself checks it at the top of every call.
    fn cancel_handle(&self) -> CancelHandle;
}

/// The default [`HttpClient`], backed by `reqwest::blocking::Client` (its
/// own internal tokio runtime is "the HTTP library's internal pool" §5
/// refers to).
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
    cancel: CancelHandle,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        ReqwestHttpClient { client: reqwest::blocking::Client::new(), cancel: CancelHandle::new() }
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn finish(resp: reqwest::blocking::Response) -> Result<HttpResponse, SyncError> {
        let status = resp.status().as_u16();
        let bytes = resp.bytes()?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|_| SyncError::UnexpectedStatus(status))?
        };
        Ok(HttpResponse { status, body })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        ReqwestHttpClient::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str, bearer: Option<&str>, timeout: Duration) -> Result<HttpResponse, SyncError> {
        self.check_cancelled()?;
        let mut req = self.client.get(url).timeout(timeout);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send()?;
        Self::finish(resp)
    }

    fn post(&self, url: &str, bearer: Option<&str>, body: &Value, timeout: Duration) -> Result<HttpResponse, SyncError> {
        self.check_cancelled()?;
        let mut req = self.client.post(url).json(body).timeout(timeout);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send()?;
        Self::finish(resp)
    }

    fn put(&self, url: &str, bearer: Option<&str>, body: &Value, timeout: Duration) -> Result<HttpResponse, SyncError> {
        self.check_cancelled()?;
        let mut req = self.client.put(url).json(body).timeout(timeout);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send()?;
        Self::finish(resp)
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

/// Clamp a caller-supplied poll timeout to the 1-60 second range §5
/// mandates.
pub fn clamp_timeout(requested_seconds: u64) -> Duration {
    Duration::from_secs(requested_seconds.clamp(1, 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_timeout_caps_at_sixty() {
        assert_eq!(clamp_timeout(0), Duration::from_secs(1));
        assert_eq!(clamp_timeout(30), Duration::from_secs(30));
        assert_eq!(clamp_timeout(600), Duration::from_secs(60));
    }

    #[test]
    fn cancel_handle_reports_state() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
    }
}
