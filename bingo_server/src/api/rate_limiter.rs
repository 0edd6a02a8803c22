//! Command rate limiting for tier WebSocket connections.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window counter
#[derive(Debug)]
struct Window {
    hits: VecDeque<Instant>,
    limit: usize,
    span: Duration,
}

impl Window {
    fn new(limit: usize, span: Duration) -> Self {
        Self {
            hits: VecDeque::with_capacity(limit),
            limit,
            span,
        }
    }

    fn expire(&mut self, now: Instant) {
        while self
            .hits
            .front()
            .is_some_and(|&hit| now.duration_since(hit) >= self.span)
        {
            self.hits.pop_front();
        }
    }

    fn is_full(&self) -> bool {
        self.hits.len() >= self.limit
    }
}

/// Per-connection limiter: a short burst window and a longer sustained one.
///
/// A command is admitted only when both windows have room, and then counts
/// against both.
#[derive(Debug)]
pub struct CommandLimiter {
    burst: Window,
    sustained: Window,
}

impl CommandLimiter {
    pub fn new(burst: usize, burst_span: Duration, sustained: usize, sustained_span: Duration) -> Self {
        Self {
            burst: Window::new(burst, burst_span),
            sustained: Window::new(sustained, sustained_span),
        }
    }

    /// Admit a command now
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    pub fn check_at(&mut self, now: Instant) -> bool {
        self.burst.expire(now);
        self.sustained.expire(now);
        if self.burst.is_full() || self.sustained.is_full() {
            return false;
        }
        self.burst.hits.push_back(now);
        self.sustained.hits.push_back(now);
        true
    }
}

impl Default for CommandLimiter {
    /// 10 commands per second, 100 per minute
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1), 100, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_limit() {
        let mut limiter = CommandLimiter::default();
        let now = Instant::now();

        for _ in 0..10 {
            assert!(limiter.check_at(now));
        }
        assert!(!limiter.check_at(now), "11th command in a second is refused");

        assert!(limiter.check_at(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_sustained_limit() {
        let mut limiter = CommandLimiter::new(5, Duration::from_secs(1), 8, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..8u64 {
            assert!(limiter.check_at(start + Duration::from_secs(i)));
        }
        assert!(!limiter.check_at(start + Duration::from_secs(10)));
        assert!(limiter.check_at(start + Duration::from_secs(61)));
    }

    #[test]
    fn test_refused_commands_do_not_count() {
        let mut limiter = CommandLimiter::new(1, Duration::from_secs(1), 2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at(now));
        assert!(!limiter.check_at(now));
        assert!(!limiter.check_at(now));
        assert!(limiter.check_at(now + Duration::from_secs(1)));
    }
}
