//! Git integration for gutter.
//!
//! A dedicated `std::thread` owns the `git2::Repository` (which is !Send);
//! [`GitProvider`] is the cloneable async handle the rest of the binary uses
//! to reach it, and the context expander's file content provider.
pub mod provider;
pub mod types;
pub mod worker;

pub use provider::GitProvider;
