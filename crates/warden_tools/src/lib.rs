//! # Warden Development Tools
//!
//! Offline utilities for operators and content authors:
//! - Content file validation
//! - Snapshot inspection
//! - Replay verification

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod inspect;
pub mod replay;
pub mod validate;

pub use error::{Result, ToolError};
