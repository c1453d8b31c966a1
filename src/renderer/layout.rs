use serde::{Deserialize, Serialize};

/// How a frame is placed inside the viewport.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutPolicy {
    /// Fill the whole viewport, ignoring aspect ratio
    #[default]
    Stretch,
    /// Native size, centered, clipped when the viewport is smaller
    #[value(name = "original", alias = "original-size")]
    #[serde(rename = "original", alias = "original-size")]
    OriginalSize,
    /// Largest size that fits while keeping the aspect ratio
    #[value(name = "aspect", alias = "preserve-aspect")]
    #[serde(rename = "aspect", alias = "preserve-aspect")]
    PreserveAspect,
}

impl LayoutPolicy {
    pub fn label(self) -> &'static str {
        match self {
            LayoutPolicy::Stretch => "stretch",
            LayoutPolicy::OriginalSize => "original size",
            LayoutPolicy::PreserveAspect => "aspect ratio",
        }
    }
}

/// Image area of the terminal, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rectangle the frame was painted into, in viewport pixels.
///
/// With `OriginalSize` the rectangle keeps the frame's native size and may
/// extend past a smaller viewport; painting clips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DrawRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        let (px, py) = (px as u64, py as u64);
        px >= self.x as u64
            && py >= self.y as u64
            && px < self.x as u64 + self.width as u64
            && py < self.y as u64 + self.height as u64
    }
}

/// Where a `frame_w` × `frame_h` frame lands inside `viewport` under `policy`.
pub fn compute_draw_rect(policy: LayoutPolicy, frame_w: u32, frame_h: u32, viewport: Viewport) -> DrawRect {
    match policy {
        LayoutPolicy::Stretch => DrawRect::new(0, 0, viewport.width, viewport.height),
        LayoutPolicy::OriginalSize => {
            let x = centered_offset(viewport.width, frame_w);
            let y = centered_offset(viewport.height, frame_h);
            DrawRect::new(x, y, frame_w, frame_h)
        }
        LayoutPolicy::PreserveAspect => {
            if frame_w == 0 || frame_h == 0 || viewport.is_empty() {
                return DrawRect::new(0, 0, frame_w, frame_h);
            }
            let aspect = frame_h as f64 / frame_w as f64;
            let mut w = viewport.width;
            let mut h = (w as f64 * aspect).round() as u32;
            if h > viewport.height {
                h = viewport.height;
                w = ((h as f64 / aspect).round() as u32).min(viewport.width);
            }
            DrawRect::new(
                centered_offset(viewport.width, w),
                centered_offset(viewport.height, h),
                w,
                h,
            )
        }
    }
}

/// Whether the area around the rect gets the background colour.
pub fn fills_background(policy: LayoutPolicy, rect: DrawRect, viewport: Viewport) -> bool {
    policy != LayoutPolicy::Stretch && (rect.width < viewport.width || rect.height < viewport.height)
}

fn centered_offset(avail: u32, size: u32) -> u32 {
    if avail > size {
        (avail - size) / 2
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretch_covers_viewport() {
        let view = Viewport::new(123, 45);
        for (w, h) in [(640, 480), (1, 1000), (2000, 3)] {
            let rect = compute_draw_rect(LayoutPolicy::Stretch, w, h, view);
            assert_eq!(rect, DrawRect::new(0, 0, 123, 45));
            assert!(!fills_background(LayoutPolicy::Stretch, rect, view));
        }
    }

    #[test]
    fn test_preserve_aspect_letterboxes_wide_viewport() {
        let view = Viewport::new(800, 300);
        let rect = compute_draw_rect(LayoutPolicy::PreserveAspect, 640, 480, view);
        assert_eq!(rect, DrawRect::new(200, 0, 400, 300));
        assert!(fills_background(LayoutPolicy::PreserveAspect, rect, view));
    }

    #[test]
    fn test_preserve_aspect_tall_viewport() {
        let view = Viewport::new(320, 480);
        let rect = compute_draw_rect(LayoutPolicy::PreserveAspect, 640, 480, view);
        assert_eq!(rect, DrawRect::new(0, 120, 320, 240));
    }

    #[test]
    fn test_preserve_aspect_zero_area_falls_back_to_native() {
        let rect = compute_draw_rect(LayoutPolicy::PreserveAspect, 64, 48, Viewport::new(0, 100));
        assert_eq!(rect, DrawRect::new(0, 0, 64, 48));
        let rect = compute_draw_rect(LayoutPolicy::PreserveAspect, 0, 48, Viewport::new(100, 100));
        assert_eq!(rect, DrawRect::new(0, 0, 0, 48));
    }

    #[test]
    fn test_original_size_centers_and_clips() {
        let rect = compute_draw_rect(LayoutPolicy::OriginalSize, 100, 50, Viewport::new(300, 40));
        assert_eq!(rect, DrawRect::new(100, 0, 100, 50));
        assert!(fills_background(LayoutPolicy::OriginalSize, rect, Viewport::new(300, 40)));

        let exact = compute_draw_rect(LayoutPolicy::OriginalSize, 300, 40, Viewport::new(300, 40));
        assert!(!fills_background(LayoutPolicy::OriginalSize, exact, Viewport::new(300, 40)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let rect = DrawRect::new(10, 20, 5, 5);
        assert!(rect.contains(10, 20));
        assert!(rect.contains(14, 24));
        assert!(!rect.contains(15, 20));
        assert!(!rect.contains(10, 25));
        assert!(!rect.contains(9, 20));
    }
}
