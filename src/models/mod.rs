pub mod bulk;
pub mod metric;
pub mod recognition;
pub mod upload;
