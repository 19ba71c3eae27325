//! # Resilience Module
//!
//! Bounded retry for transient collaborator failures. Retrying is always a
//! caller decision: clients in this crate never retry internally.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use freshmaker_core::resilience::{retry_with_timeout, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy = RetryPolicy::new(Duration::from_secs(30), Duration::from_secs(5));
//! let value = retry_with_timeout(&policy, "fetch_index", |_e: &std::io::Error| true, || async {
//!     Ok::<_, std::io::Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{retry_with_timeout, RetryPolicy};
