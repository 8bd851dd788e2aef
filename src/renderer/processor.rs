use rayon::prelude::*;

use super::cell::{CellData, Rgb, HALF_BLOCK};

/// Turns a packed RGB canvas into a grid of half-block cells.
///
/// Canvas width is the cell width; canvas height is twice the cell height.
pub struct FrameProcessor {
    pub width: usize,
    pub height: usize,
}

impl FrameProcessor {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn cell_count(&self) -> usize {
        self.width * (self.height / 2)
    }

    pub fn process_frame(&self, rgb: &[u8]) -> Vec<CellData> {
        let mut cells = vec![CellData::default(); self.cell_count()];
        self.process_frame_into(rgb, &mut cells);
        cells
    }

    pub fn process_frame_into(&self, rgb: &[u8], cells: &mut Vec<CellData>) {
        let w = self.width;
        if w == 0 {
            cells.clear();
            return;
        }
        cells.resize(self.cell_count(), CellData::default());

        let chunk_size = (cells.len() / rayon::current_num_threads().max(1)).clamp(1, 2000);

        cells.par_chunks_mut(chunk_size).enumerate().for_each(|(chunk_idx, chunk)| {
            let start_idx = chunk_idx * chunk_size;

            let pixel = |x: usize, y: usize| -> Rgb {
                let offset = (y * w + x) * 3;
                match rgb.get(offset..offset + 3) {
                    Some(p) => (p[0], p[1], p[2]),
                    None => (0, 0, 0),
                }
            };

            for (i, cell) in chunk.iter_mut().enumerate() {
                let idx = start_idx + i;
                let cx = idx % w;
                let cy = idx / w;

                *cell = CellData {
                    char: HALF_BLOCK,
                    fg: pixel(cx, cy * 2),
                    bg: pixel(cx, cy * 2 + 1),
                };
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_frame_half_block() {
        let proc = FrameProcessor::new(2, 4);
        let mut frame = vec![0u8; 2 * 4 * 3];
        // row 0 red, row 1 green, row 2 blue, row 3 yellow
        for x in 0..2 {
            frame[x * 3..x * 3 + 3].copy_from_slice(&[255, 0, 0]);
            frame[6 + x * 3..6 + x * 3 + 3].copy_from_slice(&[0, 255, 0]);
            frame[12 + x * 3..12 + x * 3 + 3].copy_from_slice(&[0, 0, 255]);
            frame[18 + x * 3..18 + x * 3 + 3].copy_from_slice(&[255, 255, 0]);
        }

        let cells = proc.process_frame(&frame);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], CellData { char: HALF_BLOCK, fg: (255, 0, 0), bg: (0, 255, 0) });
        assert_eq!(cells[1].fg, (255, 0, 0));
        assert_eq!(cells[2], CellData { char: HALF_BLOCK, fg: (0, 0, 255), bg: (255, 255, 0) });
    }

    #[test]
    fn test_short_buffer_reads_black() {
        let proc = FrameProcessor::new(2, 2);
        let cells = proc.process_frame(&[10, 20, 30]);
        assert_eq!(cells[0].fg, (10, 20, 30));
        assert_eq!(cells[1].fg, (0, 0, 0));
        assert_eq!(cells[0].bg, (0, 0, 0));
    }
}
