//! Larkspur Catalog
//!
//! Client for the remote data catalog: a content-addressed cache of task
//! outputs. A [`Dataset`] represents one version of one task; an
//! [`Artifact`] holds the output literals of one execution; a [`Tag`] binds
//! the hash of the input literal map to exactly one artifact, making the
//! artifact the canonical cached result for those inputs.
//!
//! The gRPC transport is owned elsewhere; this crate talks to the service
//! through the [`CatalogService`] trait and retries transient status codes
//! with linear backoff.

mod client;
mod entities;
mod error;
mod keys;
mod retry;
mod service;

pub use client::{CatalogClient, CatalogConfig, CatalogEntry};
pub use entities::{Artifact, ArtifactData, Dataset, DatasetId, Metadata, Tag};
pub use error::CatalogError;
pub use keys::{dataset_id_for_task, tag_name};
pub use service::{CatalogService, MemoryCatalog};
