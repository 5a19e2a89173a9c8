//! # Guidewave Layout
//!
//! Waveguide geometry for the Guidewave engine. This crate provides:
//!
//! - **Parametric structures** ([`primitives`]): straight slabs, S-bends,
//!   MMI splitters and spherical lenses defined by simple parameters.
//! - **Rasterisation** ([`discretise`]): paints structures over a
//!   background index and samples the result on the transverse grid as an
//!   [`IndexProfile`](guidewave_core::IndexProfile).

pub mod discretise;
pub mod primitives;

pub use discretise::{Layout, LayoutProfile};
pub use primitives::{Lens, Mmi, SBend, Slab, Structure};

use thiserror::Error;

/// Errors raised while validating a layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Background index must be positive and finite, got {0}")]
    InvalidBackground(f64),

    #[error("Invalid structure {position} ({kind}): {reason}")]
    InvalidStructure {
        position: usize,
        kind: &'static str,
        reason: String,
    },
}
