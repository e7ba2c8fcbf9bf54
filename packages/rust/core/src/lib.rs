//! Core pipeline orchestration for DealScope.
//!
//! This crate ties together CRM aggregation, text sanitization, and URL
//! collection into the deal-document assembly pipeline, and carries the
//! model-analysis client that consumes the assembled document.

pub mod analysis;
pub mod document;
pub mod pipeline;
