pub mod audit_log;
pub mod backoff;
pub mod bulk;
pub mod cache;
pub mod metrics;
pub mod pipeline;
pub mod recognizer;
pub mod validation;
