use rayon::prelude::*;
use super::cell::CellData;
use crate::core::pixel_buffer::CHANNELS;
use crate::shared::constants;

/// Turns an RGBA canvas into half-block terminal cells (two pixel rows per cell).
pub struct FrameProcessor {
    pub width: usize,
    pub height: usize,
}

impl FrameProcessor {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn cell_rows(&self) -> usize {
        (self.height + 1) / 2
    }

    pub fn process_frame_into(&self, canvas: &[u8], cells: &mut [CellData]) {
        let w = self.width;
        let h = self.height;

        if w == 0 || cells.len() != w * self.cell_rows() {
            return;
        }

        let chunk_size = if cells.len() > 10000 {
            2000
        } else {
            (cells.len() / rayon::current_num_threads().max(1)).max(1)
        };

        let background = (
            constants::BACKGROUND_RGBA[0],
            constants::BACKGROUND_RGBA[1],
            constants::BACKGROUND_RGBA[2],
        );

        cells.par_chunks_mut(chunk_size)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let start_idx = chunk_idx * chunk_size;

                for (i, cell) in chunk.iter_mut().enumerate() {
                    let idx = start_idx + i;
                    let cx = idx % w;
                    let cy = idx / w;

                    let get_pixel = |x: usize, y: usize| -> (u8, u8, u8) {
                        if y >= h {
                            return background;
                        }
                        let offset = (y * w + x) * CHANNELS;
                        if offset + 2 < canvas.len() {
                            (canvas[offset], canvas[offset + 1], canvas[offset + 2])
                        } else {
                            background
                        }
                    };

                    *cell = CellData {
                        char: '▀',
                        fg: get_pixel(cx, cy * 2),
                        bg: get_pixel(cx, cy * 2 + 1),
                    };
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(pixels: &[[u8; 4]]) -> Vec<u8> {
        pixels.iter().flatten().copied().collect()
    }

    fn cells_for(proc: &FrameProcessor, canvas: &[u8]) -> Vec<CellData> {
        let mut cells = vec![CellData::default(); proc.width * proc.cell_rows()];
        proc.process_frame_into(canvas, &mut cells);
        cells
    }

    #[test]
    fn test_process_frame_half_block() {
        let proc = FrameProcessor::new(2, 4);
        let red = [255, 0, 0, 255];
        let green = [0, 255, 0, 255];
        let blue = [0, 0, 255, 255];
        let yellow = [255, 255, 0, 255];
        let frame = canvas(&[red, red, green, green, blue, blue, yellow, yellow]);

        let cells = cells_for(&proc, &frame);
        assert_eq!(cells.len(), 2 * 2);
        assert_eq!(cells[0].fg, (255, 0, 0));
        assert_eq!(cells[0].bg, (0, 255, 0));
        assert_eq!(cells[3].fg, (0, 0, 255));
        assert_eq!(cells[3].bg, (255, 255, 0));
    }

    #[test]
    fn test_odd_height_pads_last_row_with_background() {
        let proc = FrameProcessor::new(1, 3);
        let white = [255, 255, 255, 255];
        let cells = cells_for(&proc, &canvas(&[white, white, white]));
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].fg, (255, 255, 255));
        assert_eq!(cells[1].bg, (0, 0, 0));
    }

    #[test]
    fn test_wrong_cell_count_is_ignored() {
        let proc = FrameProcessor::new(2, 2);
        let mut cells = vec![CellData::default(); 3];
        proc.process_frame_into(&[255; 16], &mut cells);
        assert!(cells.iter().all(|c| *c == CellData::default()));
    }
}
