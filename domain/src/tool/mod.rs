//! Tool domain module
//!
//! This module defines the **Tool Registry** model: what a tool is, how the
//! catalog of tools is versioned, and how candidate tools are discovered for
//! a goal.
//!
//! # Overview
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Tool         │───▶│ ToolCatalog  │───▶│ rank_tools   │
//! │ (record)     │    │ (snapshot)   │    │ (discovery)  │
//! └──────┬───────┘    └──────────────┘    └──────┬───────┘
//!        │                                       │
//!        ├─ name@version (append-only)           ├─ scope filter (ExecutionContext)
//!        ├─ input/output Schema                  ├─ ContextBoost
//!        └─ Embedding                            └─ cosine ≥ threshold, top_k
//! ```
//!
//! # Key Types
//!
//! - [`Tool`]: a registered capability (`name@version`, scopes, schemas, embedding)
//! - [`ToolCatalog`]: versioned snapshot read by discovery and validation
//! - [`Schema`](schema::Schema): JSON-Schema-equivalent field description
//! - [`Embedding`](embedding::Embedding) / [`ContextBoost`](embedding::ContextBoost)
//! - [`rank_tools`](discovery::rank_tools): similarity ranking
//! - [`ToolError`]: failure reported by a tool invocation
//!
//! # Architecture
//!
//! - **Domain** (this module): pure data and ranking, no I/O
//! - **Application** (`ToolRegistryPort`): port for registration and search
//! - **Infrastructure** (`InMemoryToolRegistry`): copy-on-write registry

pub mod catalog;
pub mod discovery;
pub mod embedding;
pub mod entities;
pub mod schema;
pub mod value_objects;

pub use catalog::{RegistryError, ToolCatalog};
pub use discovery::{DiscoveryQuery, ToolMatch, rank_tools};
pub use embedding::{ContextBoost, Embedding, NoBoost, TenantPreferenceBoost};
pub use entities::{Tool, ToolKey, ToolStats, ToolVersion};
pub use schema::{FieldSpec, FieldType, Schema};
pub use value_objects::{ToolError, ToolErrorCode};
