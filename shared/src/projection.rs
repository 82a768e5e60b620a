use crate::topology::{BoundingBox, Point};

/// Uniform scale plus translation from geographic space to surface pixels.
///
/// Always produced whole by [`Projection::fit`]; never adjusted piecemeal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Projection {
    /// Fit `bbox` inside a `pixel_width` x `pixel_height` rectangle, centered,
    /// without distorting its aspect ratio.
    ///
    /// Returns `None` for a zero-area box or unusable pixel dimensions.
    pub fn fit(bbox: &BoundingBox, pixel_width: f64, pixel_height: f64) -> Option<Self> {
        let (bw, bh) = (bbox.width(), bbox.height());
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !(usable(bw) && usable(bh) && usable(pixel_width) && usable(pixel_height)) {
            return None;
        }

        let scale = (pixel_width / bw).min(pixel_height / bh);
        let [cx, cy] = bbox.center();
        Some(Self {
            scale,
            translate_x: pixel_width / 2.0 - cx * scale,
            translate_y: pixel_height / 2.0 - cy * scale,
        })
    }

    /// [`Projection::fit`] over inputs that may not be known yet.
    pub fn fit_to(bbox: Option<BoundingBox>, dimensions: Option<(f64, f64)>) -> Option<Self> {
        let bbox = bbox?;
        let (w, h) = dimensions?;
        Self::fit(&bbox, w, h)
    }

    pub fn apply(&self, [x, y]: Point) -> Point {
        [
            x * self.scale + self.translate_x,
            y * self.scale + self.translate_y,
        ]
    }

    pub fn invert(&self, [px, py]: Point) -> Point {
        [
            (px - self.translate_x) / self.scale,
            (py - self.translate_y) / self.scale,
        ]
    }
}
