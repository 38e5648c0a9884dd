//! Synchronization primitives and global state management.

pub mod once_lock;

pub use once_lock::GlobalState;
