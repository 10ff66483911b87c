//! Larkspur Storage
//!
//! This crate provides the blob-store contract the node handlers read and
//! write protobuf documents through. Paths are opaque [`DataReference`]
//! strings; the handlers only rely on well-known relative names joined onto
//! directories they are handed (`futures.pb`, `outputs.pb`).
//!
//! The [`ProtobufStore`] trait defines the platform/backend layer.
//! Implementations handle the actual storage (object store, filesystem)
//! while callers work in terms of prost messages via the typed helpers on
//! `dyn ProtobufStore`.

mod memory;
mod reference;
mod store;

pub use memory::MemoryStore;
pub use reference::DataReference;
pub use store::{Options, ProtobufStore, StorageError};
