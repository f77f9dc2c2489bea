//! Approval and authorization core of the staffing backend.

pub mod access;
pub mod api;
pub mod config;
pub mod error;
pub mod memory;
pub mod repository;
pub mod telemetry;
pub mod workflows;
