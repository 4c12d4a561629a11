//! Display colour per class code
//!
//! A string hash picks one entry of a fixed palette so the same course keeps
//! the same chip colour across pages and sessions. Not for anything else.

use serde::Serialize;

/// Chip colour (background and text, CSS hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassColor {
    pub background: &'static str,
    pub text: &'static str,
}

/// (background, text) pairs
const PALETTE: [(&str, &str); 8] = [
    ("#dbe7f3", "#3f5f7f"),
    ("#f9dcd6", "#a4493b"),
    ("#e2f0d9", "#4c7a34"),
    ("#fdf1cf", "#8a6d1d"),
    ("#e9def4", "#6a4a8c"),
    ("#d7f0ee", "#2f7a73"),
    ("#f6dbe8", "#9a3f6b"),
    ("#e6e2dc", "#5e554a"),
];

/// `h * 31 + c` over the code's characters with 32-bit wraparound
pub fn code_hash(code: &str) -> i32 {
    code.chars().fold(0i32, |hash, c| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(c as i32)
    })
}

/// Palette entry for a class code
pub fn color_for_code(code: &str) -> ClassColor {
    let index = code_hash(code.trim()).unsigned_abs() as usize % PALETTE.len();
    let (background, text) = PALETTE[index];
    ClassColor { background, text }
}
