//! Bitmap text rendering for the receipt header and footer.
//!
//! Glyphs come from the Spleen 12×24 bitmap font and are scaled by whole
//! multiples with nearest-neighbour replication, so every printed stroke is
//! a pure on/off dot with no anti-aliasing.

use std::collections::HashMap;

use spleen_font::{FONT_12X24, PSF2Font};

use super::canvas::MonochromeCanvas;

/// Native glyph cell size of the Spleen font in use.
pub const GLYPH_WIDTH: usize = 12;
pub const GLYPH_HEIGHT: usize = 24;

/// One centered line of text in a text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub text: String,
    /// Integer magnification (1 = 12×24 dots per character).
    pub scale: usize,
    /// Double-strike by overprinting one dot to the right.
    pub bold: bool,
}

impl TextLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scale: 1,
            bold: false,
        }
    }

    pub fn scale(mut self, scale: usize) -> Self {
        self.scale = scale.max(1);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Glyph bitmaps (`GLYPH_WIDTH * GLYPH_HEIGHT` entries, row-major) for a
/// set of characters.
///
/// Characters missing from the font render as a box outline.
pub struct GlyphCache {
    glyphs: HashMap<char, Vec<bool>>,
}

impl GlyphCache {
    /// Rasterise every distinct character of `text`.
    pub fn for_text<'a>(text: impl IntoIterator<Item = &'a str>) -> Self {
        let mut font = PSF2Font::new(FONT_12X24).ok();
        let mut glyphs = HashMap::new();

        for ch in text.into_iter().flat_map(str::chars) {
            if glyphs.contains_key(&ch) {
                continue;
            }
            let mut bitmap = vec![false; GLYPH_WIDTH * GLYPH_HEIGHT];
            let utf8 = ch.to_string();

            let found = match font.as_mut() {
                Some(f) => match f.glyph_for_utf8(utf8.as_bytes()) {
                    Some(g) => {
                        for (row_y, row) in g.enumerate() {
                            for (col_x, on) in row.enumerate() {
                                if row_y < GLYPH_HEIGHT && col_x < GLYPH_WIDTH {
                                    bitmap[row_y * GLYPH_WIDTH + col_x] = on;
                                }
                            }
                        }
                        true
                    }
                    None => false,
                },
                None => false,
            };

            if !found {
                draw_box(&mut bitmap, GLYPH_WIDTH, GLYPH_HEIGHT);
            }
            glyphs.insert(ch, bitmap);
        }

        Self { glyphs }
    }

    pub fn get(&self, ch: char) -> Option<&[bool]> {
        self.glyphs.get(&ch).map(Vec::as_slice)
    }
}

/// Break `text` into lines of at most `max_chars` characters on word
/// boundaries; words longer than a line are hard-split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Render centered, word-wrapped lines into a canvas `width` dots wide.
///
/// Empty input lines produce no output rows.
pub fn render_lines(lines: &[TextLine], width: usize) -> MonochromeCanvas {
    let glyphs = GlyphCache::for_text(lines.iter().map(|l| l.text.as_str()));
    let mut canvas = MonochromeCanvas::new(width, 0);

    for line in lines {
        let scale = line.scale.max(1);
        let cell_w = GLYPH_WIDTH * scale;
        let cell_h = GLYPH_HEIGHT * scale;
        let max_chars = (width / cell_w).max(1);

        for wrapped in wrap(&line.text, max_chars) {
            let chars: Vec<char> = wrapped.chars().collect();
            let text_w = chars.len() * cell_w;
            let start_x = width.saturating_sub(text_w) / 2;

            let mut row = MonochromeCanvas::new(width, cell_h);
            for (i, &ch) in chars.iter().enumerate() {
                if let Some(bitmap) = glyphs.get(ch) {
                    blit_glyph(&mut row, bitmap, start_x + i * cell_w, scale, line.bold);
                }
            }
            canvas.append(&row);
        }
    }

    canvas
}

fn blit_glyph(canvas: &mut MonochromeCanvas, bitmap: &[bool], origin_x: usize, scale: usize, bold: bool) {
    for gy in 0..GLYPH_HEIGHT {
        for gx in 0..GLYPH_WIDTH {
            if !bitmap[gy * GLYPH_WIDTH + gx] {
                continue;
            }
            let x = origin_x + gx * scale;
            let y = gy * scale;
            let w = if bold { scale + 1 } else { scale };
            canvas.fill_rect(x, y, w, scale);
        }
    }
}

/// Draw a box outline in the glyph buffer.
fn draw_box(glyph: &mut [bool], width: usize, height: usize) {
    for x in 0..width {
        glyph[x] = true;
        glyph[(height - 1) * width + x] = true;
    }
    for y in 0..height {
        glyph[y * width] = true;
        glyph[y * width + width - 1] = true;
    }
}

/// Dotted horizontal rule: `dash`-dot segments separated by `gap`, drawn on
/// `rows` rows spaced `pitch` apart, in a band `height` dots tall.
pub fn dotted_rule(width: usize, height: usize, dash: usize, gap: usize, rows: usize, pitch: usize) -> MonochromeCanvas {
    let mut canvas = MonochromeCanvas::new(width, height);
    for r in 0..rows {
        let y = r * pitch;
        let mut x = 0;
        while x < width {
            canvas.fill_rect(x, y, dash.saturating_sub(1).max(1), 1);
            x += dash + gap;
        }
    }
    canvas
}
