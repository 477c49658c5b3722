//! Collection tree and job descriptors.

pub mod collection;
pub mod job;

pub use collection::{BlockUpdate, Collection, ContentBlock, Day};
pub use job::{BlockRef, GenerationMode, JobDescriptor, JobRequest, ScopeFilter, WorkingSet};
