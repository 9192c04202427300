//! Exact overlap area between a circle and axis-aligned pixels.
//!
//! The area of a circle (centered at the origin) inside a rectangle is built by
//! inclusion-exclusion from origin-anchored rectangles `[0, x] × [0, y]`. The
//! circle is symmetric about both axes, so each anchored rectangle reduces to a
//! first-quadrant area with a sign.

/// Area of the circle of radius `r` inside `[0, x] × [0, y]` for `x, y >= 0`.
#[inline]
fn quadrant_area(x: f64, y: f64, r: f64) -> f64 {
    let x = x.min(r);
    let y = y.min(r);
    let r_sq = r * r;

    if x * x + y * y <= r_sq {
        return x * y;
    }

    // Column where the arc crosses height y; left of it the rectangle is
    // clipped by y, right of it by the arc.
    let x_cross = (r_sq - y * y).max(0.0).sqrt();
    y * x_cross + arc_integral(x, r) - arc_integral(x_cross, r)
}

/// Antiderivative of `sqrt(r² - t²)`.
#[inline]
fn arc_integral(t: f64, r: f64) -> f64 {
    let r_sq = r * r;
    0.5 * (t * (r_sq - t * t).max(0.0).sqrt() + r_sq * (t / r).clamp(-1.0, 1.0).asin())
}

#[inline]
fn anchored_area(x: f64, y: f64, r: f64) -> f64 {
    let sign = if (x < 0.0) != (y < 0.0) { -1.0 } else { 1.0 };
    sign * quadrant_area(x.abs(), y.abs(), r)
}

/// Exact area of the circle of radius `r` centered at the origin that falls
/// inside `[x0, x1] × [y0, y1]`.
pub fn circle_rect_overlap(x0: f64, x1: f64, y0: f64, y1: f64, r: f64) -> f64 {
    debug_assert!(x0 <= x1 && y0 <= y1);
    if r <= 0.0 {
        return 0.0;
    }

    let area = anchored_area(x1, y1, r) - anchored_area(x0, y1, r) - anchored_area(x1, y0, r)
        + anchored_area(x0, y0, r);
    // Cancellation can leave tiny negatives for pixels that only touch the circle.
    area.clamp(0.0, (x1 - x0) * (y1 - y0))
}

/// Fraction of the unit pixel centered at `(px, py)` covered by the circle of
/// radius `r` centered at `(cx, cy)`.
#[inline]
pub fn pixel_coverage(px: f64, py: f64, cx: f64, cy: f64, r: f64) -> f64 {
    let dx = px - cx;
    let dy = py - cy;

    // Fast paths: the pixel's nearest point is outside, or its farthest corner is inside.
    let near_x = (dx.abs() - 0.5).max(0.0);
    let near_y = (dy.abs() - 0.5).max(0.0);
    if near_x * near_x + near_y * near_y >= r * r {
        return 0.0;
    }
    let far_x = dx.abs() + 0.5;
    let far_y = dy.abs() + 0.5;
    if far_x * far_x + far_y * far_y <= r * r {
        return 1.0;
    }

    circle_rect_overlap(dx - 0.5, dx + 0.5, dy - 0.5, dy + 0.5, r)
}
