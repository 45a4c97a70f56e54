#![deny(missing_docs)]

//! Rust binding for the LPM license plate detection and recognition engine.
//!
//! The engine is a closed-source shared library. This crate loads it, owns
//! its session handle, and copies every result it produces into plain Rust
//! values before handing the native memory back.

/// Error types used by the binding.
pub mod error;

/// Dynamic loading of the engine library.
pub mod loader;

/// Conversion of native structures into host values.
pub mod marshal;

/// Host images exposed to the engine.
pub mod native_image;

/// Engine sessions, modules and recognition calls.
pub mod session;

/// Reader settings file.
pub mod settings;

/// Host mirrors of the engine's data structures.
pub mod types;

pub use error::{LpmError, Result};
pub use loader::Engine;
pub use native_image::Image;
pub use session::Session;
pub use settings::Settings;
pub use types::*;
