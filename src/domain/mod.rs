//! Core domain types and logic.

pub mod ohlcv;
pub mod order;
pub mod position;
pub mod portfolio;
pub mod broker;
pub mod feed;
pub mod moving_average;
pub mod strategy;
pub mod analysis;
pub mod analyzers;
pub mod engine;
pub mod report;
pub mod symbols;
pub mod config_validation;
pub mod run_config;
pub mod error;
