use crate::shared::frame::Frame;

pub const GLYPH_WIDTH: u32 = 3;
pub const GLYPH_HEIGHT: u32 = 5;

/// 3x5 glyphs, one row per entry, bit 2 is the leftmost column.
///
/// Covers what confidence labels need. Anything else renders as a block.
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        '%' => [0x5, 0x1, 0x2, 0x4, 0x5],
        ' ' => [0x0, 0x0, 0x0, 0x0, 0x0],
        _ => [0x7, 0x7, 0x7, 0x7, 0x7],
    }
}

/// Horizontal advance per character: glyph plus one column of spacing.
fn advance(scale: u32) -> u32 {
    (GLYPH_WIDTH + 1) * scale
}

/// Width in pixels of `text` at `scale`, without trailing spacing.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        0
    } else {
        n * advance(scale) - scale
    }
}

pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Draws `text` with its top-left corner at `(x, y)`, clipped to the canvas.
pub fn draw_text(canvas: &mut Frame, x: i64, y: i64, text: &str, color: [u8; 3], scale: u32) {
    let scale = scale.max(1) as i64;
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let mut pixels = canvas.as_ndarray_mut();

    for (i, c) in text.chars().enumerate() {
        let gx = x + i as i64 * advance(scale as u32) as i64;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i64 {
                if (bits >> (GLYPH_WIDTH as i64 - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = gx + col * scale + dx;
                        let py = y + row as i64 * scale + dy;
                        if px < 0 || py < 0 || px >= cw || py >= ch {
                            continue;
                        }
                        for (ci, &v) in color.iter().enumerate() {
                            pixels[[py as usize, px as usize, ci]] = v;
                        }
                    }
                }
            }
        }
    }
}
