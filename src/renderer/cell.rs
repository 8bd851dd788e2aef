/// 24-bit color as (r, g, b).
pub type Rgb = (u8, u8, u8);

/// One terminal cell. With the upper half block, `fg` paints the top pixel
/// and `bg` the bottom one.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CellData {
    pub char: char,
    pub fg: Rgb,
    pub bg: Rgb,
}

pub const HALF_BLOCK: char = '▀';

impl Default for CellData {
    fn default() -> Self {
        Self {
            char: ' ',
            fg: (0, 0, 0),
            bg: (0, 0, 0),
        }
    }
}
