//! Slidewin - Per-key Sliding Window Rate Limiting
//!
//! This crate implements a sliding window rate limiter that tracks admitted
//! events per key, expires them lazily as keys are touched, and tells callers
//! how long to back off when a key is saturated. A traffic simulation driver
//! exercises the limiter with synthetic users.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod simulation;
