//! Core domain concepts shared across all subdomains.
//!
//! - [`goal::Goal`]: a validated natural-language goal
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod goal;
