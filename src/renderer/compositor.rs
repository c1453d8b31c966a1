use anyhow::Result;
use fast_image_resize as fr;
use fr::images::{Image, ImageRef};
use std::sync::Arc;

use super::layout::{compute_draw_rect, fills_background, DrawRect, LayoutPolicy, Viewport};
use crate::core::frame::Frame;
use crate::core::pixel_buffer::CHANNELS;
use crate::shared::constants;
use crate::sync::{FrameClock, RateStats};

/// Outcome of one render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOutput {
    pub rect: DrawRect,
    pub viewport: Viewport,
    pub background_filled: bool,
    pub stats: RateStats,
}

/// Holds the frame on screen and paints it into a viewport-sized RGBA canvas.
pub struct DisplayCompositor {
    current: Option<Frame>,
    last_draw_rect: Option<DrawRect>,
    clock: Arc<FrameClock>,
    resizer: fr::Resizer,
    // Nearest-neighbour keeps every painted pixel a real frame value
    resize_options: fr::ResizeOptions,
    // Reused between renders, resized only when the viewport changes
    canvas: Vec<u8>,
    canvas_size: Viewport,
}

impl DisplayCompositor {
    pub fn new(clock: Arc<FrameClock>) -> Self {
        Self {
            current: None,
            last_draw_rect: None,
            clock,
            resizer: fr::Resizer::new(),
            resize_options: fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest),
            canvas: Vec::new(),
            canvas_size: Viewport::default(),
        }
    }

    /// Replace the frame to show; the previous one is dropped.
    pub fn set_frame(&mut self, frame: Frame) {
        self.current = Some(frame);
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.current.as_ref().map(Frame::size)
    }

    pub fn last_draw_rect(&self) -> Option<DrawRect> {
        self.last_draw_rect
    }

    /// RGBA bytes of the last render, `viewport.width * 4` per row.
    pub fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    pub fn canvas_size(&self) -> Viewport {
        self.canvas_size
    }

    /// Paint the current frame; `None` when there is nothing to show.
    pub fn render(&mut self, viewport: Viewport, policy: LayoutPolicy) -> Result<Option<RenderOutput>> {
        let Some(frame) = self.current.as_ref() else {
            return Ok(None);
        };

        let (frame_w, frame_h) = frame.size();
        let rect = compute_draw_rect(policy, frame_w, frame_h, viewport);
        let background_filled = fills_background(policy, rect, viewport);

        let canvas_len = viewport.width as usize * viewport.height as usize * CHANNELS;
        if self.canvas.len() != canvas_len {
            self.canvas.resize(canvas_len, 0);
        }
        self.canvas_size = viewport;

        if background_filled {
            for px in self.canvas.chunks_exact_mut(CHANNELS) {
                px.copy_from_slice(&constants::BACKGROUND_RGBA);
            }
        }

        if !viewport.is_empty() && rect.width > 0 && rect.height > 0 {
            let pixels = frame.pixels();
            if rect.width == frame_w && rect.height == frame_h {
                blit(&mut self.canvas, viewport, pixels.as_bytes(), pixels.stride(), rect);
            } else {
                let src = ImageRef::new(frame_w, frame_h, pixels.as_bytes(), fr::PixelType::U8x4)?;
                let mut scaled = Image::new(rect.width, rect.height, fr::PixelType::U8x4);
                self.resizer.resize(&src, &mut scaled, &self.resize_options)?;
                blit(
                    &mut self.canvas,
                    viewport,
                    scaled.buffer(),
                    rect.width as usize * CHANNELS,
                    rect,
                );
            }
        }

        self.last_draw_rect = Some(rect);
        self.clock.record_render();

        Ok(Some(RenderOutput {
            rect,
            viewport,
            background_filled,
            stats: self.clock.render_stats(),
        }))
    }
}

/// Copy `rect.width × rect.height` source pixels to `rect` on the canvas, clipped to the viewport.
fn blit(canvas: &mut [u8], viewport: Viewport, src: &[u8], src_stride: usize, rect: DrawRect) {
    if rect.x >= viewport.width || rect.y >= viewport.height {
        return;
    }
    let visible_w = rect.width.min(viewport.width - rect.x) as usize;
    let visible_h = rect.height.min(viewport.height - rect.y) as usize;
    let canvas_stride = viewport.width as usize * CHANNELS;
    let copy_len = visible_w * CHANNELS;

    for row in 0..visible_h {
        let src_offset = row * src_stride;
        let dst_offset = (rect.y as usize + row) * canvas_stride + rect.x as usize * CHANNELS;
        if src_offset + copy_len <= src.len() && dst_offset + copy_len <= canvas.len() {
            canvas[dst_offset..dst_offset + copy_len]
                .copy_from_slice(&src[src_offset..src_offset + copy_len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pixel_buffer::PixelBuffer;
    use std::time::Duration;

    fn compositor() -> DisplayCompositor {
        DisplayCompositor::new(Arc::new(FrameClock::new()))
    }

    fn solid_frame(w: u32, h: u32, rgba: [u8; 4]) -> Frame {
        Frame::new(PixelBuffer::filled(w, h, rgba), Duration::ZERO)
    }

    fn canvas_pixel(comp: &DisplayCompositor, x: u32, y: u32) -> [u8; 4] {
        let stride = comp.canvas_size().width as usize * CHANNELS;
        let off = y as usize * stride + x as usize * CHANNELS;
        let c = comp.canvas();
        [c[off], c[off + 1], c[off + 2], c[off + 3]]
    }

    #[test]
    fn test_render_without_frame_is_noop() {
        let mut comp = compositor();
        let out = comp.render(Viewport::new(10, 10), LayoutPolicy::Stretch).unwrap();
        assert!(out.is_none());
        assert!(comp.last_draw_rect().is_none());
    }

    #[test]
    fn test_original_size_letterboxes_with_background() {
        let mut comp = compositor();
        comp.set_frame(solid_frame(4, 2, [200, 100, 50, 255]));
        let out = comp
            .render(Viewport::new(8, 6), LayoutPolicy::OriginalSize)
            .unwrap()
            .unwrap();

        assert_eq!(out.rect, DrawRect::new(2, 2, 4, 2));
        assert!(out.background_filled);
        assert_eq!(canvas_pixel(&comp, 0, 0), constants::BACKGROUND_RGBA);
        assert_eq!(canvas_pixel(&comp, 2, 2), [200, 100, 50, 255]);
        assert_eq!(canvas_pixel(&comp, 5, 3), [200, 100, 50, 255]);
        assert_eq!(canvas_pixel(&comp, 6, 3), constants::BACKGROUND_RGBA);
        assert_eq!(comp.last_draw_rect(), Some(out.rect));
    }

    #[test]
    fn test_original_size_clips_to_small_viewport() {
        let mut comp = compositor();
        comp.set_frame(solid_frame(10, 10, [1, 2, 3, 255]));
        let out = comp
            .render(Viewport::new(4, 3), LayoutPolicy::OriginalSize)
            .unwrap()
            .unwrap();
        assert_eq!(out.rect, DrawRect::new(0, 0, 10, 10));
        assert!(!out.background_filled);
        assert_eq!(comp.canvas().len(), 4 * 3 * CHANNELS);
        assert_eq!(canvas_pixel(&comp, 3, 2), [1, 2, 3, 255]);
    }

    #[test]
    fn test_stretch_scales_over_whole_viewport() {
        let mut comp = compositor();
        comp.set_frame(solid_frame(2, 2, [10, 20, 30, 255]));
        let out = comp
            .render(Viewport::new(6, 4), LayoutPolicy::Stretch)
            .unwrap()
            .unwrap();
        assert_eq!(out.rect, DrawRect::new(0, 0, 6, 4));
        assert!(!out.background_filled);
        assert_eq!(canvas_pixel(&comp, 0, 0), [10, 20, 30, 255]);
        assert_eq!(canvas_pixel(&comp, 5, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn test_preserve_aspect_rect_and_background() {
        let mut comp = compositor();
        comp.set_frame(solid_frame(4, 3, [9, 9, 9, 255]));
        let out = comp
            .render(Viewport::new(16, 6), LayoutPolicy::PreserveAspect)
            .unwrap()
            .unwrap();
        assert_eq!(out.rect, DrawRect::new(4, 0, 8, 6));
        assert!(out.background_filled);
        assert_eq!(canvas_pixel(&comp, 0, 0), constants::BACKGROUND_RGBA);
        assert_eq!(canvas_pixel(&comp, 4, 0), [9, 9, 9, 255]);
    }

    #[test]
    fn test_render_records_render_cadence() {
        let clock = Arc::new(FrameClock::new());
        let mut comp = DisplayCompositor::new(Arc::clone(&clock));
        comp.set_frame(solid_frame(2, 2, [0, 0, 0, 255]));
        comp.render(Viewport::new(2, 2), LayoutPolicy::Stretch).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let out = comp.render(Viewport::new(2, 2), LayoutPolicy::Stretch).unwrap().unwrap();
        assert!(out.stats.avg_rate > 0.0);
        assert_eq!(clock.arrival_stats(), RateStats::default());
    }

    #[test]
    fn test_zero_viewport_does_not_panic() {
        let mut comp = compositor();
        comp.set_frame(solid_frame(4, 4, [0, 0, 0, 255]));
        let out = comp
            .render(Viewport::new(0, 0), LayoutPolicy::PreserveAspect)
            .unwrap()
            .unwrap();
        assert_eq!(out.rect, DrawRect::new(0, 0, 4, 4));
        assert!(comp.canvas().is_empty());
    }
}
