//! # Submission Guard
//!
//! Rejects a mutating request while another request with the same
//! `Idempotency-Key` is still being handled. The dashboard sends one key per
//! form submission, so a double click or a retried save cannot create two
//! orders or deduct stock twice.
//!
//! ```text
//!  POST + key "k1" ──► acquire("k1") ──► handler ──► ticket dropped ──► "k1" free
//!  POST + key "k1" ──► acquire("k1") ✗ ──► 409 DUPLICATE_SUBMISSION
//! ```
//!
//! Requests without the header, and GET requests, pass straight through.
//! Keys are held only while in flight; completed responses are not replayed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Longest accepted key.
const MAX_KEY_LEN: usize = 128;

/// Keys of submissions currently in flight.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Holds a key until dropped.
#[derive(Debug)]
pub struct SubmissionTicket {
    guard: SubmissionGuard,
    key: String,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        SubmissionGuard::default()
    }

    /// Claims `key`, or `None` if it is already in flight.
    pub fn acquire(&self, key: &str) -> Option<SubmissionTicket> {
        if !self.lock().insert(key.to_string()) {
            return None;
        }
        Some(SubmissionTicket {
            guard: self.clone(),
            key: key.to_string(),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked mid-insert.
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.key);
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Middleware enforcing one in-flight request per `Idempotency-Key`.
pub async fn submission_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_mutating(req.method()) {
        return next.run(req).await;
    }

    let Some(key) = req
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    else {
        return next.run(req).await;
    };

    if key.len() > MAX_KEY_LEN {
        return ApiError::validation(format!(
            "Idempotency-Key must be at most {} characters",
            MAX_KEY_LEN
        ))
        .into_response();
    }

    let Some(_ticket) = state.guard.acquire(&key) else {
        warn!(key = %key, path = %req.uri().path(), "Duplicate submission rejected");
        return ApiError::new(
            ErrorCode::DuplicateSubmission,
            "This submission is already being processed",
        )
        .into_response();
    };

    next.run(req).await
}
