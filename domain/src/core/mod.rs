//! Core domain concepts shared across all subdomains.
//!
//! - [`error::ValidationError`] - malformed shapes and forbidden fields
//! - [`error::DomainError`] - umbrella over every domain failure

pub mod error;
