//! Content-stream walking for positioned text runs.
//!
//! Only the text state needed for layout is tracked: font size, leading and
//! the text/line matrices. The current transformation matrix is assumed to be
//! the identity, and glyph widths are estimated from the font size since
//! embedded font metrics are not read.

use crate::fonts::{decode_plain, FontDecoder, PageFonts};
use crate::TextRun;
use lopdf::content::Operation;
use lopdf::Object;

/// Estimated horizontal advance of one glyph, as a fraction of the font size.
pub const GLYPH_ADVANCE_EM: f32 = 0.5;

/// Share of the font size that sits above the baseline.
const ASCENT_EM: f32 = 0.8;

/// TJ adjustments (thousandths of an em) wider than this are read as a space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

#[derive(Debug)]
struct TextState {
    font_size: f32,
    leading: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self { font_size: 12.0, leading: 0.0, text_matrix: IDENTITY, line_matrix: IDENTITY }
    }
}

impl TextState {
    fn begin_text(&mut self) {
        self.text_matrix = IDENTITY;
        self.line_matrix = IDENTITY;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = translate(&self.line_matrix, tx, ty);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn set_matrix(&mut self, matrix: Matrix) {
        self.text_matrix = matrix;
        self.line_matrix = matrix;
    }

    /// Emit a run for `text` at the current position and advance past it.
    fn show(&mut self, text: String, page_height: f32, runs: &mut Vec<TextRun>) {
        let glyphs = text.chars().count() as f32;
        let advance = glyphs * self.font_size * GLYPH_ADVANCE_EM;

        let [a, _, _, d, e, f] = self.text_matrix;
        let width = advance * a.abs();
        let height = self.font_size * d.abs();

        if !text.trim().is_empty() && width > 0.0 && height > 0.0 {
            runs.push(TextRun {
                text,
                x: e,
                y: page_height - (f + height * ASCENT_EM),
                width,
                height,
            });
        }

        self.text_matrix = translate(&self.text_matrix, advance, 0.0);
    }

    fn shift(&mut self, thousandths: f32) {
        let tx = -thousandths / 1000.0 * self.font_size;
        self.text_matrix = translate(&self.text_matrix, tx, 0.0);
    }
}

fn translate(m: &Matrix, tx: f32, ty: f32) -> Matrix {
    [m[0], m[1], m[2], m[3], tx * m[0] + ty * m[2] + m[4], tx * m[1] + ty * m[3] + m[5]]
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|obj| obj.as_float().ok())
}

fn string_operand(obj: &Object, font: Option<&FontDecoder>) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(match font {
            Some(font) => font.decode(bytes),
            None => decode_plain(bytes),
        }),
        _ => None,
    }
}

/// Collect runs, decoding strings with the font selected by the last `Tf`.
pub(crate) fn collect_runs(
    operations: &[Operation],
    fonts: &PageFonts,
    page_height: f32,
) -> Vec<TextRun> {
    let mut state = TextState::default();
    let mut font: Option<&FontDecoder> = None;
    let mut runs = Vec::new();

    for op in operations {
        let operands = &op.operands;

        match op.operator.as_str() {
            "BT" => state.begin_text(),
            "Tf" => {
                font = operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| fonts.get(name));
                if let Some(size) = number(operands, 1) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = number(operands, 0) {
                    state.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                    state.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                    state.leading = -ty;
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                let values: Vec<f32> = (0..6).filter_map(|i| number(operands, i)).collect();
                if let [a, b, c, d, e, f] = values[..] {
                    state.set_matrix([a, b, c, d, e, f]);
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(|obj| string_operand(obj, font)) {
                    state.show(text, page_height, &mut runs);
                }
            }
            "'" => {
                state.next_line();
                if let Some(text) = operands.first().and_then(|obj| string_operand(obj, font)) {
                    state.show(text, page_height, &mut runs);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(text) = operands.get(2).and_then(|obj| string_operand(obj, font)) {
                    state.show(text, page_height, &mut runs);
                }
            }
            "TJ" => {
                let Some(Object::Array(items)) = operands.first() else {
                    continue;
                };

                // One TJ array becomes one run; wide negative kerning reads as a space.
                let mut text = String::new();
                let mut kerning = 0.0;
                for item in items {
                    if let Some(part) = string_operand(item, font) {
                        text.push_str(&part);
                    } else if let Ok(adjustment) = item.as_float() {
                        if adjustment < -TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                            text.push(' ');
                        } else {
                            kerning += adjustment;
                        }
                    }
                }

                state.show(text, page_height, &mut runs);
                state.shift(kerning);
            }
            _ => {}
        }
    }

    runs
}
