//! Pixel → normalised coordinate mapping.

use thiserror::Error;

use super::types::{NormalizedPoint, NORMALIZED_MAX};

/// Caller-side input that can never be resolved to a region.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// The image has not been laid out yet, or was rendered with no area.
    #[error("rendered image has no usable size ({width}x{height})")]
    UnrenderedImage { width: f64, height: f64 },

    /// Click coordinates were NaN or infinite.
    #[error("click position is not a finite number")]
    InvalidClick,
}

/// Map a click at `(click_x, click_y)` pixels, measured from the top-left
/// corner of the displayed image, into the 0–1000 region space.
///
/// `rendered_width` / `rendered_height` are the on-screen (post-scaling)
/// dimensions of the image.  Clicks outside the image are mapped as-is and
/// will simply not hit any region.
///
/// ```
/// use point_reader::region::normalize_click;
///
/// let p = normalize_click(320.0, 240.0, 640.0, 480.0).unwrap();
/// assert_eq!((p.x, p.y), (500.0, 500.0));
///
/// assert!(normalize_click(10.0, 10.0, 0.0, 480.0).is_err());
/// ```
pub fn normalize_click(
    click_x: f64,
    click_y: f64,
    rendered_width: f64,
    rendered_height: f64,
) -> Result<NormalizedPoint, InputError> {
    if !is_positive(rendered_width) || !is_positive(rendered_height) {
        return Err(InputError::UnrenderedImage {
            width: rendered_width,
            height: rendered_height,
        });
    }
    if !click_x.is_finite() || !click_y.is_finite() {
        return Err(InputError::InvalidClick);
    }

    let scale = f64::from(NORMALIZED_MAX);
    Ok(NormalizedPoint::new(
        click_x / rendered_width * scale,
        click_y / rendered_height * scale,
    ))
}

fn is_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
