//! In-memory storage backend for the vigil authentication core.
//!
//! Backed by concurrent hash maps, strongly consistent, and suitable for
//! tests, single-process deployments, and as the reference implementation
//! of the repository traits. All state is lost on drop.

mod repositories;

pub use repositories::{
    MemoryAccountRepository, MemoryAttemptLog, MemoryRepositoryProvider, MemoryRevocationStore,
};
