use super::layout::{DrawRect, LayoutPolicy};

/// Map a viewport point back to the frame pixel it shows.
///
/// `rect` is the rectangle of the last render; it may be one frame stale
/// after a resize. Returns `None` for points outside the painted image.
pub fn map_to_image(
    point: (u32, u32),
    rect: DrawRect,
    frame_size: (u32, u32),
    policy: LayoutPolicy,
) -> Option<(u32, u32)> {
    let (px, py) = point;
    let (frame_w, frame_h) = frame_size;
    if frame_w == 0 || frame_h == 0 || rect.width == 0 || rect.height == 0 {
        return None;
    }
    if !rect.contains(px, py) {
        return None;
    }

    let dx = px - rect.x;
    let dy = py - rect.y;

    match policy {
        LayoutPolicy::OriginalSize => {
            // Rect larger than the frame only happens when the frame changed size since the last paint
            if dx >= frame_w || dy >= frame_h {
                return None;
            }
            Some((dx, dy))
        }
        LayoutPolicy::Stretch | LayoutPolicy::PreserveAspect => {
            let fx = dx as f64 / rect.width as f64;
            let fy = dy as f64 / rect.height as f64;
            Some((scale_index(fx, frame_w), scale_index(fy, frame_h)))
        }
    }
}

/// Floor `fraction * dim`, clamped against rounding at the far edge.
fn scale_index(fraction: f64, dim: u32) -> u32 {
    let idx = (fraction * dim as f64).floor();
    if idx <= 0.0 {
        0
    } else {
        (idx as u32).min(dim - 1)
    }
}
