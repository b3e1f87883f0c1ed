//! Infrastructure layer - External service implementations

pub mod experiment;
pub mod logging;
pub mod observability;
pub mod services;
pub mod storage;
