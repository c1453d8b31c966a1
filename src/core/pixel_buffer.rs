use anyhow::{bail, Result};
use rayon::prelude::*;

/// Bytes per pixel in every buffer that enters the display pipeline.
pub const CHANNELS: usize = 4;

/// In-memory order of the four channels delivered by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Rgba,
    Bgra,
}

impl ChannelLayout {
    pub fn swaps_red_blue(self) -> bool {
        matches!(self, ChannelLayout::Bgra)
    }
}

/// Row-major RGBA pixel grid.
///
/// The buffer is never mutated after construction; every transform builds a
/// new one. Rows are `stride` bytes apart and `stride * height` bytes are
/// always valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Copy a transport-owned buffer, converting it to RGBA.
    ///
    /// The output rows are tightly packed regardless of the source stride.
    pub fn from_raw(
        bytes: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
        layout: ChannelLayout,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("empty image {}x{}", width, height);
        }
        let row_len = width as usize * CHANNELS;
        if row_stride < row_len {
            bail!("row stride {} shorter than row length {}", row_stride, row_len);
        }
        // Last row only needs row_len bytes, padding after it is optional
        let needed = row_stride * (height as usize - 1) + row_len;
        if bytes.len() < needed {
            bail!("image {}x{} needs {} bytes, got {}", width, height, needed, bytes.len());
        }

        let mut data = vec![0u8; row_len * height as usize];
        let swap = layout.swaps_red_blue();

        data.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, dst_row)| {
                let src_row = &bytes[y * row_stride..y * row_stride + row_len];
                if swap {
                    for (dst, src) in dst_row.chunks_exact_mut(CHANNELS).zip(src_row.chunks_exact(CHANNELS)) {
                        dst[0] = src[2];
                        dst[1] = src[1];
                        dst[2] = src[0];
                        dst[3] = src[3];
                    }
                } else {
                    dst_row.copy_from_slice(src_row);
                }
            });

        Ok(Self { width, height, stride: row_len, data })
    }

    /// Wrap tightly packed RGBA bytes.
    #[cfg(test)]
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let stride = width as usize * CHANNELS;
        if data.len() != stride * height as usize {
            bail!(
                "rgba buffer for {}x{} must be {} bytes, got {}",
                width,
                height,
                stride * height as usize,
                data.len()
            );
        }
        Ok(Self { width, height, stride, data })
    }

    #[cfg(test)]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let stride = width as usize * CHANNELS;
        let mut data = vec![0u8; stride * height as usize];
        for px in data.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&rgba);
        }
        Self { width, height, stride, data }
    }

    /// New buffer with red and blue exchanged.
    #[cfg(test)]
    pub fn swap_red_blue(&self) -> Self {
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(CHANNELS) {
            px.swap(0, 2);
        }
        Self { data, ..*self }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        Some(&self.data[start..start + self.width as usize * CHANNELS])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        let offset = x as usize * CHANNELS;
        Some([row[offset], row[offset + 1], row[offset + 2], row[offset + 3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgra_2x2() -> Vec<u8> {
        vec![
            // row 0: blue, green
            255, 0, 0, 255, 0, 255, 0, 255,
            // row 1: red, half-transparent white
            0, 0, 255, 255, 255, 255, 255, 128,
        ]
    }

    #[test]
    fn test_bgra_is_normalized_to_rgba() {
        let buf = PixelBuffer::from_raw(&bgra_2x2(), 2, 2, 8, ChannelLayout::Bgra).unwrap();
        assert_eq!(buf.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(buf.pixel(1, 0), Some([0, 255, 0, 255]));
        assert_eq!(buf.pixel(0, 1), Some([255, 0, 0, 255]));
        assert_eq!(buf.pixel(1, 1), Some([255, 255, 255, 128]));
    }

    #[test]
    fn test_layouts_agree_on_canonical_order() {
        let bgra = bgra_2x2();
        let from_bgra = PixelBuffer::from_raw(&bgra, 2, 2, 8, ChannelLayout::Bgra).unwrap();
        let rgba = from_bgra.as_bytes().to_vec();
        let from_rgba = PixelBuffer::from_raw(&rgba, 2, 2, 8, ChannelLayout::Rgba).unwrap();
        assert_eq!(from_bgra, from_rgba);
    }

    #[test]
    fn test_swap_twice_is_identity() {
        let buf = PixelBuffer::from_raw(&bgra_2x2(), 2, 2, 8, ChannelLayout::Rgba).unwrap();
        let swapped = buf.swap_red_blue();
        assert_ne!(swapped, buf);
        assert_eq!(swapped.swap_red_blue(), buf);
    }

    #[test]
    fn test_padded_stride_is_dropped_on_copy() {
        // 1x2 image, 4 bytes of padding after each row
        let raw = vec![1, 2, 3, 4, 9, 9, 9, 9, 5, 6, 7, 8];
        let buf = PixelBuffer::from_raw(&raw, 1, 2, 8, ChannelLayout::Rgba).unwrap();
        assert_eq!(buf.stride(), 4);
        assert_eq!(buf.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        let raw = vec![0u8; 16];
        assert!(PixelBuffer::from_raw(&raw, 0, 2, 8, ChannelLayout::Rgba).is_err());
        assert!(PixelBuffer::from_raw(&raw, 2, 0, 8, ChannelLayout::Rgba).is_err());
        assert!(PixelBuffer::from_raw(&raw, 2, 2, 4, ChannelLayout::Rgba).is_err());
        assert!(PixelBuffer::from_raw(&raw, 2, 3, 8, ChannelLayout::Rgba).is_err());
    }

    #[test]
    fn test_pixel_out_of_range() {
        let buf = PixelBuffer::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(buf.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(buf.pixel(3, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
    }
}
