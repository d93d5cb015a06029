//! PROPHET: Autonomous Up/Down Round Prediction Agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod data;
pub mod platforms;
pub mod strategy;
pub mod engine;
pub mod storage;
