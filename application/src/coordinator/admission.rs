//! Per-user admission control.

use crate::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use taskforge_domain::UserId;
use tokio::time::Instant;

/// Decides whether a user may start another execution right now.
pub trait AdmissionControl: Send + Sync {
    /// Count one execution against `user`, or return how long until a slot
    /// frees up.
    fn try_admit(&self, user: &UserId) -> Result<(), Duration>;

    /// Give back the most recent admission of `user` (the request was
    /// refused further down the line).
    fn refund(&self, user: &UserId);
}

/// Sliding-window counter keyed by user id.
///
/// Check and record happen under one lock, so two concurrent requests from
/// the same user can never both take the last slot.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<UserId, VecDeque<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admissions of `user` still inside the window.
    pub fn in_window(&self, user: &UserId) -> usize {
        let now = Instant::now();
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .get(user)
            .map(|w| w.iter().filter(|t| now.duration_since(**t) < self.config.window).count())
            .unwrap_or(0)
    }

    /// Users with at least one admission still tracked.
    pub fn tracked_users(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl AdmissionControl for SlidingWindowRateLimiter {
    fn try_admit(&self, user: &UserId) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, window| {
            while window
                .front()
                .is_some_and(|oldest| now.duration_since(*oldest) >= self.config.window)
            {
                window.pop_front();
            }
            !window.is_empty()
        });
        let window = windows.entry(user.clone()).or_default();

        if window.len() >= self.config.max_executions as usize {
            let retry_after = window
                .front()
                .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.config.window);
            return Err(retry_after);
        }

        window.push_back(now);
        Ok(())
    }

    fn refund(&self, user: &UserId) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(window) = windows.get_mut(user) {
            window.pop_back();
            if window.is_empty() {
                windows.remove(user);
            }
        }
    }
}
