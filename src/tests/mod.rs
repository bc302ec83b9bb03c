// src/tests/mod.rs
//! Cross-component scenarios

mod regional_scenarios;
