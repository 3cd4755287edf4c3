//! Integration tests for the configuration description directory

mod concurrency;
mod traffic_model;
