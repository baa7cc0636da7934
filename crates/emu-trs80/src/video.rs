//! Video memory decoding.
//!
//! The Model III displays 16 rows of 64 characters straight out of the
//! 1K window at 0x3C00. Rendering is out of scope; the scheduler
//! publishes a copy of the window at each frame boundary and this
//! module turns one into readable text.

/// Characters per row.
pub const COLS: usize = 64;
/// Rows on screen.
pub const ROWS: usize = 16;
/// Size of the video window in bytes.
pub const CELLS: usize = COLS * ROWS;

/// One published frame: the video window as of a frame boundary plus a
/// running frame counter, so a reader can tell a fresh frame from a
/// stale one.
#[derive(Clone)]
pub struct VideoFrame {
    pub cells: [u8; CELLS],
    pub frame: u64,
}

impl VideoFrame {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: [0; CELLS],
            frame: 0,
        }
    }
}

impl Default for VideoFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a video window as 16 newline-separated rows of text. ASCII
/// passes through, control codes show their letter-range alias (the
/// character generator repeats 0x40-0x5F there), and the block graphics
/// range comes out as `#`.
#[must_use]
pub fn screen_text(cells: &[u8; CELLS]) -> String {
    let mut out = String::with_capacity(CELLS + ROWS);
    for row in 0..ROWS {
        if row > 0 {
            out.push('\n');
        }
        for col in 0..COLS {
            out.push(glyph(cells[row * COLS + col]));
        }
    }
    out
}

fn glyph(byte: u8) -> char {
    match byte {
        0x20..=0x7E => byte as char,
        0x00..=0x1F => (byte + 0x40) as char,
        _ => '#',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sixteen_rows_of_sixty_four() {
        let cells = [b' '; CELLS];
        let text = screen_text(&cells);
        assert_eq!(text.lines().count(), ROWS);
        assert!(text.lines().all(|line| line.len() == COLS));
    }

    #[test]
    fn ascii_passes_through_and_graphics_are_masked() {
        let mut cells = [b' '; CELLS];
        cells[0] = b'H';
        cells[1] = b'I';
        cells[2] = 0x01; // control alias of 'A'
        cells[3] = 0x80; // block graphics
        let text = screen_text(&cells);
        assert!(text.starts_with("HIA#"));
    }

    #[test]
    fn rows_advance_every_sixty_four_cells() {
        let mut cells = [b' '; CELLS];
        cells[COLS] = b'X';
        let text = screen_text(&cells);
        let second = text.lines().nth(1).unwrap();
        assert!(second.starts_with('X'));
    }
}
