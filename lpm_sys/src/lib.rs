//! Raw declarations of the LPM engine C ABI (`lpm.h`, `lpm_type.h`) and of the
//! `ERImage` structure it exchanges images through.
//!
//! Layouts follow the 7.x SDK headers. Nothing here is checked against the
//! binary at runtime: a layout mismatch corrupts memory silently, so the
//! layout tests in `types.rs` pin every offset the binding relies on.

mod api;
mod er_image;
mod types;

pub use api::*;
pub use er_image::*;
pub use types::*;
