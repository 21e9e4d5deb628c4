//! Common utilities and shared types for hearth.
//!
//! This crate provides foundational components used across all hearth crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: HTTP-facing error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use hearth_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = IdGenerator::new().generate();
//!     println!("{} minted {id}", config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, FederationConfig, OnFollow};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
