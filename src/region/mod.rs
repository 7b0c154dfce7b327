//! Text regions and the tap → region mapping.
//!
//! # Flow
//!
//! ```text
//! tap (pixels) ──normalize_click──▶ NormalizedPoint ──hit_test──▶ Option<&Region>
//! ```
//!
//! Everything here is pure: no I/O, no hidden state.  The session controller
//! calls into it on every tap, and presentation code uses [`overlay::layout`]
//! to draw highlights.

pub mod normalize;
pub mod overlay;
pub mod types;

pub use hit_test::{hit_index, hit_test};
pub use normalize::{normalize_click, InputError};
pub use overlay::Overlay;
pub use types::{BoundingBox, NormalizedPoint, Region, NORMALIZED_MAX};
