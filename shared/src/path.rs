use std::fmt::Write;

use crate::projection::Projection;
use crate::topology::Ring;

/// Decimal digits kept in emitted coordinates.
pub const PRECISION: i32 = 2;

/// Render rings as one SVG path description: `M x,y L x,y ... Z` per ring,
/// concatenated. No rings renders as the empty string.
pub fn render_path(projection: &Projection, rings: &[Ring]) -> String {
    let mut d = String::new();
    for ring in rings {
        let points = match ring.as_slice() {
            [first, inner @ .., last] if first == last => &ring[..=inner.len()],
            all => all,
        };
        let Some((first, rest)) = points.split_first() else {
            continue;
        };

        d.push('M');
        push_point(&mut d, projection, *first);
        for point in rest {
            d.push('L');
            push_point(&mut d, projection, *point);
        }
        d.push('Z');
    }
    d
}

fn push_point(d: &mut String, projection: &Projection, point: [f64; 2]) {
    let [x, y] = projection.apply(point);
    let _ = write!(d, "{},{}", round_coord(x), round_coord(y));
}

/// Round to [`PRECISION`] decimals; `-0` becomes `0` so output stays stable.
pub fn round_coord(v: f64) -> f64 {
    let factor = 10f64.powi(PRECISION);
    let rounded = (v * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}
