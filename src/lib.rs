//! Lead Routing & Distribution Engine Library
//!
//! This library provides the core functionality of the lead routing API:
//! lead intake and validation, per-lender eligibility rules, authenticated
//! lender adapters, concurrent distribution, and the deduped-lead retry sweep.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `eligibility`: Per-lender eligibility evaluation.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `lenders`: Lender adapters, session handling and the adapter registry.
//! - `models`: Core data models.
//! - `retry`: Deduped-lead retry sweep and its background job.
//! - `routing`: Intake and distribution pipeline.
//! - `storage`: Database storage operations.
//! - `validation`: Intake payload validation.

// Re-export primary modules for shared use in tests
pub mod config;
pub mod db;
pub mod eligibility;
pub mod errors;
pub mod handlers;
pub mod lenders;
pub mod models;
pub mod retry;
pub mod routing;
pub mod storage;
pub mod validation;
