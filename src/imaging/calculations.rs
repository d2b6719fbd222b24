//! Pure calculation functions for the composite layout.
//!
//! All functions here are pure and testable without any I/O or images.

/// Scale `dims` by the fraction `[numerator, denominator]` using integer
/// division on each axis.
///
/// # Examples
/// ```
/// # use recap::imaging::overlay_dimensions;
/// // One third of a 1500x2000 shot → 500x666
/// assert_eq!(overlay_dimensions((1500, 2000), [1, 3]), (500, 666));
/// ```
pub fn overlay_dimensions(dims: (u32, u32), scale: [u32; 2]) -> (u32, u32) {
    let [num, den] = scale;
    if den == 0 {
        return (0, 0);
    }
    let apply = |v: u32| (u64::from(v) * u64::from(num) / u64::from(den)) as u32;
    (apply(dims.0), apply(dims.1))
}

/// Whether pixel `(x, y)` lies inside a `width`×`height` rounded rectangle
/// with corner `radius`.
///
/// Pixels are sampled at their centers. The radius is clamped to half the
/// shorter side so oversized radii degrade to a pill/circle.
pub fn inside_rounded_rect(x: u32, y: u32, width: u32, height: u32, radius: u32) -> bool {
    if x >= width || y >= height {
        return false;
    }

    let r = f64::from(radius.min(width / 2).min(height / 2));
    if r == 0.0 {
        return true;
    }

    let px = f64::from(x) + 0.5;
    let py = f64::from(y) + 0.5;
    let (w, h) = (f64::from(width), f64::from(height));

    // Distance past the straight edges of the inner (corner-free) rectangle.
    let dx = (r - px).max(px - (w - r)).max(0.0);
    let dy = (r - py).max(py - (h - r)).max(0.0);

    dx * dx + dy * dy <= r * r
}
