// SPDX-FileCopyrightText: 2025 Glasshouse Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Sliding-window local request budget
//!
//! The indexer applies its own rate limiting upstream; [`RequestBudget`] is a
//! proactive self-throttle that keeps us comfortably below that ceiling so
//! normal traffic never trips the reactive 429 handling in the retry loop.
//!
//! The budget is an explicit, injectable object rather than module-level
//! state: one instance can be shared across several clients via `Arc`, and the
//! internal mutex keeps the ceiling intact under concurrent callers.

use std::sync::{Mutex, PoisonError};

use tokio::time::{Duration, Instant};

/// Default request quota per window, matching the indexer's public tier
pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 30;

/// Default rolling window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Counter state for the current window
#[derive(Debug)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

/// Process-local sliding-window rate limiter
///
/// Grants up to `max_requests` acquisitions per rolling `window`. When the
/// budget is exhausted the caller is expected to sleep [`Self::time_until_reset`]
/// and re-invoke [`Self::try_acquire`] exactly once; the window will have
/// elapsed by then, so no acquisition loop is needed.
#[derive(Debug)]
pub struct RequestBudget {
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RequestBudget {
    /// Create a budget granting `max_requests` per `window`
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(WindowState {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Create a budget with a 60 second window
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, DEFAULT_WINDOW)
    }

    /// Try to reserve one request slot in the current window
    ///
    /// Rolls the window over when it has elapsed. Returns `false` without
    /// mutating the counter when the quota is spent.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if now.duration_since(state.window_start) > self.window {
            state.count = 0;
            state.window_start = now;
        }
        if state.count >= self.max_requests {
            return false;
        }
        state.count += 1;
        true
    }

    /// Time remaining until the current window rolls over
    ///
    /// Zero when the window has already elapsed.
    pub fn time_until_reset(&self) -> Duration {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.window
            .saturating_sub(Instant::now().duration_since(state.window_start))
    }

    /// Request slots still available in the current window
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if Instant::now().duration_since(state.window_start) > self.window {
            self.max_requests
        } else {
            self.max_requests.saturating_sub(state.count)
        }
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_WINDOW, DEFAULT_WINDOW)
    }
}
