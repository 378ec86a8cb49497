//! Viewport geometry.
//!
//! Rectangles are viewport-relative, in CSS pixels, with `top < bottom`
//! growing downwards like `getBoundingClientRect()`.

use crate::config::RootMargin;

/// A bounding rectangle relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Rect {
    /// Build from position and size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            top: y,
            right: x + width,
            bottom: y + height,
            left: x,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    #[inline]
    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Grow the rectangle by a root margin (negative lengths shrink it).
    ///
    /// Percentages resolve against this rectangle's own size, vertical
    /// margins against its height and horizontal ones against its width.
    pub fn expand(&self, margin: &RootMargin) -> Self {
        let (width, height) = (self.width(), self.height());
        Self {
            top: self.top - margin.top.resolve(height),
            right: self.right + margin.right.resolve(width),
            bottom: self.bottom + margin.bottom.resolve(height),
            left: self.left - margin.left.resolve(width),
        }
    }

    /// Overlap of two rectangles, `None` when they are disjoint.
    ///
    /// Rectangles that only touch along an edge do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let overlap = Rect {
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
            left: self.left.max(other.left),
        };
        let disjoint = self.bottom <= other.top
            || self.top >= other.bottom
            || self.right <= other.left
            || self.left >= other.right;
        (!disjoint).then_some(overlap)
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// Visible viewport size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Pick the window inner size, falling back per axis to the document
    /// client size when the inner size is zero or unavailable.
    pub fn resolve(inner: (f64, f64), client: (f64, f64)) -> Self {
        let pick = |inner: f64, client: f64| {
            if inner.is_finite() && inner > 0.0 {
                inner
            } else {
                client
            }
        };
        Self {
            width: pick(inner.0, client.0),
            height: pick(inner.1, client.1),
        }
    }

    /// The viewport as a rectangle at the origin.
    pub fn rect(&self) -> Rect {
        Rect::from_xywh(0.0, 0.0, self.width, self.height)
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Whether `rect` has positive overlap with `[0, width) × [0, height)`.
///
/// Edges are strict: a rectangle whose bottom sits at `0` is not visible.
#[inline]
pub fn in_viewport(rect: &Rect, viewport: Viewport) -> bool {
    rect.bottom > 0.0
        && rect.right > 0.0
        && rect.left < viewport.width
        && rect.top < viewport.height
}

/// Fraction of `target` visible inside `root`.
///
/// A zero-height target counts as fully visible once it lies within the root.
pub fn intersection_ratio(target: &Rect, root: &Rect) -> f64 {
    let Some(overlap) = target.intersection(root) else {
        return 0.0;
    };
    let area = target.area();
    if area == 0.0 {
        return 1.0;
    }
    (overlap.area() / area).clamp(0.0, 1.0)
}

/// Intersection state of `target` against `root`: `(is_intersecting, ratio)`.
///
/// With a zero threshold any overlap counts, otherwise the visible fraction
/// has to reach the threshold.
pub fn intersection_state(target: &Rect, root: &Rect, threshold: f64) -> (bool, f64) {
    let overlaps = target.bottom > root.top
        && target.top < root.bottom
        && target.right > root.left
        && target.left < root.right;
    if !overlaps {
        return (false, 0.0);
    }
    let ratio = intersection_ratio(target, root);
    let intersecting = if threshold <= 0.0 {
        true
    } else {
        ratio >= threshold
    };
    (intersecting, ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Length;

    const VIEWPORT: Viewport = Viewport::new(1024.0, 768.0);

    fn rect(top: f64, right: f64, bottom: f64, left: f64) -> Rect {
        Rect {
            top,
            right,
            bottom,
            left,
        }
    }

    #[test]
    fn test_in_viewport_inside() {
        assert!(in_viewport(&rect(10.0, 200.0, 160.0, 0.0), VIEWPORT));
    }

    #[test]
    fn test_in_viewport_edges_are_strict() {
        // bottom == 0 touches the top edge only
        assert!(!in_viewport(&rect(-150.0, 100.0, 0.0, 0.0), VIEWPORT));
        assert!(!in_viewport(&rect(768.0, 100.0, 918.0, 0.0), VIEWPORT));
        assert!(!in_viewport(&rect(0.0, 0.0, 100.0, -100.0), VIEWPORT));
        assert!(!in_viewport(&rect(0.0, 1124.0, 100.0, 1024.0), VIEWPORT));
        assert!(in_viewport(&rect(-150.0, 100.0, 0.5, 0.0), VIEWPORT));
    }

    #[test]
    fn test_in_viewport_agrees_with_overlap() {
        let screen = VIEWPORT.rect();
        for top in [-400.0, -150.0, -1.0, 0.0, 300.0, 767.0, 768.0, 2000.0] {
            for left in [-2000.0, -50.0, 0.0, 1023.0, 1024.0] {
                let r = Rect::from_xywh(left, top, 150.0, 150.0);
                assert_eq!(
                    in_viewport(&r, VIEWPORT),
                    r.intersection(&screen).is_some(),
                    "rect {r:?}"
                );
            }
        }
    }

    #[test]
    fn test_viewport_resolve_falls_back_to_client_size() {
        assert_eq!(
            Viewport::resolve((0.0, 600.0), (800.0, 500.0)),
            Viewport::new(800.0, 600.0)
        );
        assert_eq!(
            Viewport::resolve((f64::NAN, 0.0), (800.0, 500.0)),
            Viewport::new(800.0, 500.0)
        );
    }

    #[test]
    fn test_intersection_ratio() {
        let root = VIEWPORT.rect();
        assert_eq!(intersection_ratio(&Rect::from_xywh(0.0, 718.0, 100.0, 100.0), &root), 0.5);
        assert_eq!(intersection_ratio(&Rect::from_xywh(0.0, 900.0, 100.0, 100.0), &root), 0.0);
        assert_eq!(intersection_ratio(&Rect::from_xywh(0.0, 10.0, 100.0, 0.0), &root), 1.0);
    }

    #[test]
    fn test_intersection_state_threshold() {
        let root = VIEWPORT.rect();
        let half = Rect::from_xywh(0.0, 718.0, 100.0, 100.0);
        assert_eq!(intersection_state(&half, &root, 0.0), (true, 0.5));
        assert_eq!(intersection_state(&half, &root, 0.5), (true, 0.5));
        assert_eq!(intersection_state(&half, &root, 0.75), (false, 0.5));
    }

    #[test]
    fn test_expand_by_margin() {
        let margin = RootMargin {
            top: Length::Px(0.0),
            right: Length::Px(0.0),
            bottom: Length::Percent(50.0),
            left: Length::Px(0.0),
        };
        let root = VIEWPORT.rect().expand(&margin);
        assert_eq!(root.bottom, 768.0 + 384.0);

        let below = Rect::from_xywh(0.0, 900.0, 100.0, 100.0);
        assert!(intersection_state(&below, &root, 0.0).0);
    }
}
