// src/resilience/tests/mod.rs
//! Tests for resilience features

mod health_monitor_tests;
