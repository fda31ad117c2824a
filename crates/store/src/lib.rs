//! Storage adapters for the Taiga ETL pipeline.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Implements the storage ports of [`pipeline`]
//! ([`pipeline::RawDataStore`], [`pipeline::EntityStore`],
//! [`pipeline::DomainStore`], [`pipeline::WatermarkStore`]). The stages are
//! handed a store; they never open one.
//!
//! [`MemoryStore`] keeps all state in process and can persist it as a JSON
//! snapshot so watermarks survive between invocations of the CLI.

pub mod errors;
pub mod memory;

pub use errors::StoreError;
pub use memory::MemoryStore;
