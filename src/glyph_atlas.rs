//! Built-in 8x8 bitmap glyphs, used when no font file is configured.

pub const GLYPH_WIDTH: u32 = 8;
pub const GLYPH_HEIGHT: u32 = 8;

type GlyphRows = [u8; GLYPH_HEIGHT as usize];

// Row masks, most significant bit is the leftmost column.
const BUILTIN_GLYPHS: &[(char, GlyphRows)] = &[
    (' ', [0; 8]),
    (
        '.',
        [0, 0, 0, 0, 0, 0b0001_1000, 0b0001_1000, 0],
    ),
    (
        ':',
        [0, 0b0001_1000, 0b0001_1000, 0, 0, 0b0001_1000, 0b0001_1000, 0],
    ),
    ('-', [0, 0, 0, 0b0111_1110, 0, 0, 0, 0]),
    ('=', [0, 0, 0b0111_1110, 0, 0b0111_1110, 0, 0, 0]),
    (
        '+',
        [
            0,
            0b0001_1000,
            0b0001_1000,
            0b0111_1110,
            0b0001_1000,
            0b0001_1000,
            0,
            0,
        ],
    ),
    (
        '*',
        [
            0,
            0b0110_0110,
            0b0011_1100,
            0b1111_1111,
            0b0011_1100,
            0b0110_0110,
            0,
            0,
        ],
    ),
    (
        '#',
        [
            0b0010_0100,
            0b0010_0100,
            0b0111_1110,
            0b0010_0100,
            0b0111_1110,
            0b0010_0100,
            0b0010_0100,
            0,
        ],
    ),
    (
        '%',
        [
            0b0110_0010,
            0b0110_0100,
            0b0000_1000,
            0b0001_0000,
            0b0010_0110,
            0b0100_0110,
            0,
            0,
        ],
    ),
    (
        '@',
        [
            0b0011_1100,
            0b0100_0010,
            0b0101_1010,
            0b0101_0110,
            0b0101_1100,
            0b0100_0000,
            0b0011_1100,
            0,
        ],
    ),
    (
        '3',
        [
            0b0011_1100,
            0b0100_0010,
            0b0000_0010,
            0b0001_1100,
            0b0000_0010,
            0b0100_0010,
            0b0011_1100,
            0,
        ],
    ),
    (
        '7',
        [
            0b0111_1110,
            0b0000_0010,
            0b0000_0100,
            0b0000_1000,
            0b0001_0000,
            0b0001_0000,
            0b0001_0000,
            0,
        ],
    ),
    (
        '/',
        [
            0b0000_0010,
            0b0000_0100,
            0b0000_1000,
            0b0001_0000,
            0b0010_0000,
            0b0100_0000,
            0b1000_0000,
            0,
        ],
    ),
    (
        '□',
        [
            0,
            0b0111_1110,
            0b0100_0010,
            0b0100_0010,
            0b0100_0010,
            0b0100_0010,
            0b0111_1110,
            0,
        ],
    ),
    (
        '■',
        [
            0,
            0b0111_1110,
            0b0111_1110,
            0b0111_1110,
            0b0111_1110,
            0b0111_1110,
            0b0111_1110,
            0,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GlyphAtlas;

impl GlyphAtlas {
    pub fn new() -> Self {
        Self
    }

    pub fn contains(&self, glyph: char) -> bool {
        self.rows(glyph).is_some()
    }

    fn rows(&self, glyph: char) -> Option<&'static GlyphRows> {
        BUILTIN_GLYPHS
            .iter()
            .find(|(candidate, _)| *candidate == glyph)
            .map(|(_, rows)| rows)
    }

    pub fn sample(&self, glyph: char, x: u32, y: u32) -> bool {
        if x >= GLYPH_WIDTH || y >= GLYPH_HEIGHT {
            return false;
        }
        let Some(rows) = self.rows(glyph) else {
            return false;
        };
        let row_mask = rows[y as usize];
        ((row_mask >> (GLYPH_WIDTH - 1 - x)) & 1) == 1
    }

    /// Lit pixel count, used to order glyphs by visual density.
    pub fn coverage(&self, glyph: char) -> u32 {
        self.rows(glyph)
            .map(|rows| rows.iter().map(|row| row.count_ones()).sum())
            .unwrap_or(0)
    }
}
