//! Gate-access license plate recognition
//!
//! This library provides the recognition pipeline behind the plate-gate
//! service: image validation, a content-addressed result cache, retried
//! calls to a primary recognizer with cloud fallback, operation metrics,
//! a durable audit log and a sequential bulk processor.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
