//! SleepCycle library - wake-time calculation service
//!
//! This module exports internal components for integration testing.

pub mod api;
pub mod cli;
pub mod config;
pub mod http;
pub mod metrics;
pub mod offset;
pub mod server;
pub mod sleep;
pub mod validation;
