//! Percentage rectangles for drawing region highlights over the image.
//!
//! Presentation code positions each highlight relative to the displayed
//! image, so the layout is independent of the rendered pixel size.

use super::types::Region;

/// One highlight rectangle, in percent of the displayed image.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Set for the region currently being read aloud.
    pub active: bool,
}

/// Lay out one [`Overlay`] per region, in detection order.  `active` is
/// the index of the region being read, so identical entries stay distinct.
pub fn layout(regions: &[Region], active: Option<usize>) -> Vec<Overlay> {
    regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let b = region.bounds;
            Overlay {
                left: percent(i32::from(b.xmin)),
                top: percent(i32::from(b.ymin)),
                width: percent(i32::from(b.xmax) - i32::from(b.xmin)).max(0.0),
                height: percent(i32::from(b.ymax) - i32::from(b.ymin)).max(0.0),
                active: active == Some(index),
            }
        })
        .collect()
}

fn percent(normalized: i32) -> f32 {
    normalized as f32 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::BoundingBox;

    #[test]
    fn layout_converts_to_percent() {
        let regions = vec![Region::new("Hello", BoundingBox::new(100, 100, 200, 300))];
        let overlays = layout(&regions, None);
        assert_eq!(
            overlays,
            vec![Overlay {
                left: 10.0,
                top: 10.0,
                width: 20.0,
                height: 10.0,
                active: false,
            }]
        );
    }

    #[test]
    fn only_active_region_is_flagged() {
        let regions = vec![
            Region::new("Hello", BoundingBox::new(100, 100, 200, 300)),
            Region::new("lo", BoundingBox::new(150, 250, 180, 290)),
        ];
        let overlays = layout(&regions, Some(1));
        assert!(!overlays[0].active);
        assert!(overlays[1].active);
    }

    #[test]
    fn duplicate_regions_flag_only_the_active_index() {
        let twin = Region::new("Exit", BoundingBox::new(400, 400, 450, 500));
        let regions = vec![twin.clone(), twin];
        let overlays = layout(&regions, Some(0));
        assert!(overlays[0].active);
        assert!(!overlays[1].active);
    }

    #[test]
    fn inverted_box_has_zero_size() {
        let regions = vec![Region::new("x", BoundingBox::new(200, 300, 100, 100))];
        let o = &layout(&regions, None)[0];
        assert_eq!(o.width, 0.0);
        assert_eq!(o.height, 0.0);
    }
}
