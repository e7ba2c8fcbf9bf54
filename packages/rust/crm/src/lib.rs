//! CRM data access: deal fetch, association resolution, batch reads, and
//! engagement aggregation.
//!
//! This crate provides:
//! - [`CrmClient`] — authenticated HTTP client for the CRM REST API
//! - [`catalog`] — the fixed engagement-category table (category → attributes)
//! - [`aggregator`] — association-driven collection of contacts, companies,
//!   and engagements for one deal

pub mod aggregator;
pub mod catalog;
mod client;

pub use aggregator::{collect_companies, collect_contacts, collect_engagements};
pub use client::{CrmClient, ObjectRecord};
