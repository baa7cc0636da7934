//! Keyboard matrix.
//!
//! The Model III keyboard is an 8x8 matrix memory-mapped at
//! 0x3800-0x3BFF. The low address byte selects rows (bit N set selects
//! row N) and a read returns the OR of every selected row, a set bit
//! meaning a pressed key. Only the low byte takes part in the decode,
//! so the window repeats every 256 bytes.
//!
//! Row layout:
//!
//! | Row | bit 0 | 1     | 2     | 3  | 4    | 5    | 6     | 7     |
//! |-----|-------|-------|-------|----|------|------|-------|-------|
//! | 0   | @     | A     | B     | C  | D    | E    | F     | G     |
//! | 1   | H     | I     | J     | K  | L    | M    | N     | O     |
//! | 2   | P     | Q     | R     | S  | T    | U    | V     | W     |
//! | 3   | X     | Y     | Z     |    |      |      |       |       |
//! | 4   | 0     | 1     | 2     | 3  | 4    | 5    | 6     | 7     |
//! | 5   | 8     | 9     | :     | ;  | ,    | -    | .     | /     |
//! | 6   | Enter | Clear | Break | Up | Down | Left | Right | Space |
//! | 7   | Shift |       |       |    |      |      |       |       |

/// Matrix row holding the shift key.
pub const SHIFT_ROW: usize = 7;
/// Bit of the shift key within its row.
pub const SHIFT_BIT: u8 = 0;

#[derive(Debug, Default)]
pub struct Keyboard {
    rows: [u8; 8],
}

impl Keyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Presses or releases one key.
    pub fn set_key(&mut self, row: usize, bit: u8, pressed: bool) {
        let mask = 1u8 << (bit & 7);
        if pressed {
            self.rows[row & 7] |= mask;
        } else {
            self.rows[row & 7] &= !mask;
        }
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    /// Reads the matrix for a row-select byte. Every selected row is
    /// ORed into the result, which is what the hardware's open
    /// collector drivers produce when several rows are strobed at once.
    #[must_use]
    pub fn read(&self, select: u8) -> u8 {
        let mut value = 0;
        for (row, &bits) in self.rows.iter().enumerate() {
            if select & (1 << row) != 0 {
                value |= bits;
            }
        }
        value
    }

    #[must_use]
    pub fn rows(&self) -> [u8; 8] {
        self.rows
    }

    pub fn set_rows(&mut self, rows: [u8; 8]) {
        self.rows = rows;
    }
}

/// Maps a character to its matrix position as `(row, bit, shifted)`,
/// or `None` for characters the Model III cannot type. Letters map to
/// their unshifted position; the machine produces upper case either
/// way.
#[must_use]
pub fn key_for_char(c: char) -> Option<(usize, u8, bool)> {
    let code = match c {
        '@' | 'A'..='Z' => c as u8 - b'@',
        'a'..='z' => c as u8 - b'`',
        '0'..='7' => return Some((4, c as u8 - b'0', false)),
        '8' | '9' => return Some((5, c as u8 - b'8', false)),
        ':' => return Some((5, 2, false)),
        ';' => return Some((5, 3, false)),
        ',' => return Some((5, 4, false)),
        '-' => return Some((5, 5, false)),
        '.' => return Some((5, 6, false)),
        '/' => return Some((5, 7, false)),
        '!' => return Some((4, 1, true)),
        '"' => return Some((4, 2, true)),
        '#' => return Some((4, 3, true)),
        '$' => return Some((4, 4, true)),
        '%' => return Some((4, 5, true)),
        '&' => return Some((4, 6, true)),
        '\'' => return Some((4, 7, true)),
        '(' => return Some((5, 0, true)),
        ')' => return Some((5, 1, true)),
        '*' => return Some((5, 2, true)),
        '+' => return Some((5, 3, true)),
        '<' => return Some((5, 4, true)),
        '=' => return Some((5, 5, true)),
        '>' => return Some((5, 6, true)),
        '?' => return Some((5, 7, true)),
        '\n' => return Some((6, 0, false)),
        ' ' => return Some((6, 7, false)),
        _ => return None,
    };
    Some((usize::from(code) / 8, code % 8, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_key_appears_in_its_row() {
        let mut kb = Keyboard::new();
        kb.set_key(0, 1, true); // A
        assert_eq!(kb.read(0x01), 0x02);
        assert_eq!(kb.read(0x02), 0x00);
        kb.set_key(0, 1, false);
        assert_eq!(kb.read(0x01), 0x00);
    }

    #[test]
    fn multiple_selected_rows_are_ored() {
        let mut kb = Keyboard::new();
        kb.set_key(0, 1, true); // A
        kb.set_key(1, 0, true); // H
        assert_eq!(kb.read(0x03), 0x03);
        assert_eq!(kb.read(0xFF), 0x03);
    }

    #[test]
    fn zero_select_reads_zero() {
        let mut kb = Keyboard::new();
        kb.set_key(2, 7, true);
        assert_eq!(kb.read(0x00), 0x00);
    }

    #[test]
    fn release_all_clears_the_matrix() {
        let mut kb = Keyboard::new();
        kb.set_key(3, 2, true);
        kb.set_key(6, 7, true);
        kb.release_all();
        assert_eq!(kb.read(0xFF), 0x00);
    }

    #[test]
    fn letters_map_to_the_documented_rows() {
        assert_eq!(key_for_char('@'), Some((0, 0, false)));
        assert_eq!(key_for_char('A'), Some((0, 1, false)));
        assert_eq!(key_for_char('G'), Some((0, 7, false)));
        assert_eq!(key_for_char('H'), Some((1, 0, false)));
        assert_eq!(key_for_char('P'), Some((2, 0, false)));
        assert_eq!(key_for_char('Z'), Some((3, 2, false)));
        assert_eq!(key_for_char('z'), key_for_char('Z'));
    }

    #[test]
    fn digits_and_punctuation_map_with_shift_state() {
        assert_eq!(key_for_char('0'), Some((4, 0, false)));
        assert_eq!(key_for_char('7'), Some((4, 7, false)));
        assert_eq!(key_for_char('8'), Some((5, 0, false)));
        assert_eq!(key_for_char('!'), Some((4, 1, true)));
        assert_eq!(key_for_char('?'), Some((5, 7, true)));
        assert_eq!(key_for_char('\n'), Some((6, 0, false)));
        assert_eq!(key_for_char(' '), Some((6, 7, false)));
        assert_eq!(key_for_char('\t'), None);
    }
}
