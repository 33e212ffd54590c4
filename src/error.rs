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

//! Error taxonomy for the engine.
//!
//! Mirrors the propagation policy in the design: `NotFound`/`KeyExists`
//! never leave the `kv`/`cache` layers as errors, transport and malformed
//! responses are recoverable (the sync loop backs off), and anything else
//! out of the KV layer or an allocation failure is fatal.

use std::fmt;

/// Error returned by the [`crate::kv`] layer.
///
/// Any variant other than [`KvError::NotFound`] and [`KvError::KeyExists`]
/// is fatal: callers should route it through [`abort_with_diagnostic`]
/// rather than attempt to recover.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The requested key was not present. Always converted to `None` by
    /// callers, never surfaced to the sync loop.
    #[error("key not found")]
    NotFound,
    /// A `NO_OVERWRITE`/`NO_DUP_DATA` put collided with an existing entry.
    #[error("key already exists")]
    KeyExists,
    /// Any other failure from the backing LMDB environment. Fatal.
    #[error("storage backend failure: {0}")]
    Backend(#[from] heed::Error),
    /// The process ran out of memory while touching the store. Fatal.
    #[error("out of memory")]
    OutOfMemory,
}

impl KvError {
    /// Whether this error is an in-band condition the caller is expected
    /// to handle (as opposed to a fatal storage failure).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KvError::NotFound | KvError::KeyExists)
    }

    /// Abort the process on any LMDB failure other than `KEY_EXISTS`
    /// (which callers check for directly via the `heed::Error` they get
    /// back) — `spec.md`'s "any failure other than `KEY_EXISTS` or
    /// `NOT_FOUND` is fatal and aborts the process with a diagnostic".
    /// Called at the point each backend error is produced, rather than
    /// handed back as a `Result` a caller could mistake for recoverable.
    /// The `KvError` return type is never actually reached; it only lets
    /// this sit in the same `map_err`/match position a fallible
    /// constructor would.
    pub(crate) fn fatal_backend(err: heed::Error) -> KvError {
        abort_with_diagnostic("LMDB backend failure", &err)
    }

    /// Abort the process on allocation failure, matching `spec.md`'s
    /// "out-of-memory is fatal everywhere".
    pub(crate) fn fatal_out_of_memory() -> KvError {
        abort_with_diagnostic("out of memory", &"allocation failed")
    }
}

/// Error returned while decoding a sync response into typed events.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The top-level sync response was not a JSON object.
    #[error("sync response is not a JSON object")]
    NotAnObject,
    /// A required field (`event_id`, `sender`, `type`, `origin_server_ts`,
    /// `content`) was missing or of the wrong shape; the event carrying it
    /// is dropped, not the whole response.
    #[error("event missing required field `{0}`")]
    MissingField(&'static str),
    /// The event's `type` is recognized but its `content` failed to parse
    /// into the expected shape.
    #[error("malformed content for event type `{0}`")]
    MalformedContent(String),
}

/// Error returned by [`crate::cache::Cache`] operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Propagated from the KV layer; always a fatal condition by the time
    /// it reaches here (recoverable ones are absorbed into `Ignored`).
    #[error(transparent)]
    Kv(#[from] KvError),
    /// Propagated from the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The stored JSON for an event could not be round-tripped.
    #[error("corrupt event JSON for {0}: {1}")]
    CorruptJson(String, serde_json::Error),
}

/// Error returned by the [`crate::sync`] loop and [`crate::http`] layer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// HTTP or network-level failure; the loop backs off and retries.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// A response body couldn't be parsed as the JSON the status code
    /// implied it should carry.
    #[error("unexpected response (status {0})")]
    UnexpectedStatus(u16),
    /// Propagated from the codec while parsing a sync response.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Propagated from the cache while saving a batch.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Cooperative cancellation was observed.
    #[error("cancelled")]
    Cancelled,
}

impl From<SyncError> for EngineError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Transport(source) => EngineError::TransportFailure(source.to_string()),
            SyncError::UnexpectedStatus(code) => EngineError::TransportFailure(format!("unexpected status {code}")),
            SyncError::Codec(codec) => EngineError::MalformedJson(codec),
            SyncError::Cache(cache) => cache.into(),
            SyncError::Cancelled => EngineError::Cancelled,
        }
    }
}

/// Top-level error taxonomy, matching §7 of the design.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Null, empty, or out-of-range argument at an API entry point.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A request requiring authentication was issued with no access token
    /// on file.
    #[error("not logged in")]
    NotLoggedIn,
    /// HTTP or network-level failure; recoverable via backoff.
    #[error("transport failure: {0}")]
    TransportFailure(String),
    /// Response parsed as JSON but was missing a required field or had the
    /// wrong shape.
    #[error(transparent)]
    MalformedJson(#[from] CodecError),
    /// Fatal: the process should reset the terminal and abort.
    #[error("out of memory")]
    OutOfMemory,
    /// Fatal: an unexpected KV failure.
    #[error(transparent)]
    KvFailure(#[from] KvError),
    /// Internal: a single sync iteration should retry after backing off.
    #[error("backed off")]
    BackedOff,
    /// Cooperative cancellation was observed.
    #[error("cancelled")]
    Cancelled,
}

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Kv(kv) => EngineError::KvFailure(kv),
            CacheError::Codec(codec) => EngineError::MalformedJson(codec),
            CacheError::CorruptJson(id, source) => {
                EngineError::MalformedJson(CodecError::MalformedContent(format!(
                    "{id}: {source}"
                )))
            }
        }
    }
}

/// Abort the process with a diagnostic message.
///
/// This is the single choke point fatal errors (out-of-memory, unexpected
/// KV failures) go through, matching `util/fatal.c`'s `fatal()` in the
/// source this engine is modeled on: restore whatever terminal state the
/// host has set up, print the diagnostic, and exit non-zero. The engine
/// itself owns no terminal state, so this only logs and aborts.
pub fn abort_with_diagnostic(context: &str, cause: &(dyn fmt::Display)) -> ! {
    tracing::error!(context, %cause, "fatal error, aborting process");
    eprintln!("matrix-tui-engine: fatal: {context}: {cause}");
    std::process::abort();
}
