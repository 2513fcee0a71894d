//! Tool registry adapters

mod catalog_file;
mod in_memory;

pub use catalog_file::{CatalogFile, CatalogFileError, FileToolEntry};
pub use in_memory::InMemoryToolRegistry;
