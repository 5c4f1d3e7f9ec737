//! Observability infrastructure for RangeDesk
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics
//! - Ingestion metric helpers for the analytics feeds
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("rangedesk", LogFormat::Pretty, "info")?;
//!
//! // Optional
//! observability::metrics::init_metrics(9464)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, IngestMetrics, IngestTimer};
