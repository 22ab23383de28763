//! Label Measurement and Fitting

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

/// Appended to truncated labels.
pub const ELLIPSIS: &str = "…";

/// Measures rendered text width in pixels.
///
/// [`fit_label`] is generic over this so tests can use fixed-advance
/// closures; production measurement comes from [`FontPainter`].
pub trait TextMeasure {
    fn width_px(&self, text: &str) -> u32;
}

impl<F> TextMeasure for F
where
    F: Fn(&str) -> u32,
{
    fn width_px(&self, text: &str) -> u32 {
        self(text)
    }
}

/// Fit `text` into `max_width` pixels.
///
/// Returns the trimmed text unchanged when it fits. Otherwise binary
/// searches prefix lengths for the longest prefix whose `prefix + "…"`
/// still fits and returns that. Empty input (after trimming) returns the
/// empty string; so does a budget too small for the ellipsis alone.
pub fn fit_label<M: TextMeasure + ?Sized>(measure: &M, text: &str, max_width: u32) -> String {
    let clean = text.trim();
    if clean.is_empty() {
        return String::new();
    }
    if measure.width_px(clean) <= max_width {
        return clean.to_string();
    }
    if measure.width_px(ELLIPSIS) > max_width {
        return String::new();
    }

    let chars: Vec<char> = clean.chars().collect();
    let mut lo = 0usize;
    let mut hi = chars.len();
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        let mut candidate: String = chars[..mid].iter().collect();
        candidate.push_str(ELLIPSIS);
        if measure.width_px(&candidate) <= max_width {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let mut fitted: String = chars[..lo].iter().collect();
    fitted.push_str(ELLIPSIS);
    fitted
}

/// Renders labels at a requested pixel size onto an RGBA surface.
///
/// Object-safe so the tile factory can hold `&dyn LabelPainter`; the pixel
/// size travels with each call because Mode A and Mode B cards use
/// different font sizes within one pass.
pub trait LabelPainter: Send + Sync {
    fn width_px(&self, text: &str, px: f32) -> u32;

    /// Vertical extent of one text line.
    fn line_height_px(&self, px: f32) -> u32;

    /// Draw `text` centered horizontally on `cx`, top edge at `top`.
    fn draw(&self, surface: &mut RgbaImage, text: &str, px: f32, cx: i32, top: i32, color: Rgba<u8>);
}

/// Font-backed painter.
pub struct FontPainter {
    font: Font<'static>,
}

impl FontPainter {
    /// Build from raw TTF/OTF bytes. `None` when the bytes are not a font.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        Font::try_from_vec(bytes).map(|font| Self { font })
    }

    fn glyph_span(&self, text: &str, scale: Scale) -> f32 {
        let v_metrics = self.font.v_metrics(scale);
        let mut width: f32 = 0.0;
        for glyph in self.font.layout(text, scale, point(0.0, v_metrics.ascent)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                width = width.max(bb.max.x as f32);
            }
            width = width.max(glyph.position().x + glyph.unpositioned().h_metrics().advance_width);
        }
        width
    }
}

impl LabelPainter for FontPainter {
    fn width_px(&self, text: &str, px: f32) -> u32 {
        if text.is_empty() {
            return 0;
        }
        self.glyph_span(text, Scale::uniform(px)).ceil() as u32
    }

    fn line_height_px(&self, px: f32) -> u32 {
        let vm = self.font.v_metrics(Scale::uniform(px));
        (vm.ascent - vm.descent).ceil().max(1.0) as u32
    }

    fn draw(
        &self,
        surface: &mut RgbaImage,
        text: &str,
        px: f32,
        cx: i32,
        top: i32,
        color: Rgba<u8>,
    ) {
        if text.is_empty() {
            return;
        }
        let scale = Scale::uniform(px);
        let v_metrics = self.font.v_metrics(scale);
        let width = self.glyph_span(text, scale);
        let origin_x = cx as f32 - width / 2.0;
        let baseline = top as f32 + v_metrics.ascent;

        for glyph in self
            .font
            .layout(text, scale, point(origin_x, baseline))
        {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = gx as i32 + bb.min.x;
                let y = gy as i32 + bb.min.y;
                if x < 0 || y < 0 {
                    return;
                }
                let (x, y) = (x as u32, y as u32);
                if x >= surface.width() || y >= surface.height() {
                    return;
                }
                let alpha = coverage.clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    return;
                }
                let dst = surface.get_pixel_mut(x, y);
                let inv = 1.0 - alpha;
                dst.0[0] = (color.0[0] as f32 * alpha + dst.0[0] as f32 * inv) as u8;
                dst.0[1] = (color.0[1] as f32 * alpha + dst.0[1] as f32 * inv) as u8;
                dst.0[2] = (color.0[2] as f32 * alpha + dst.0[2] as f32 * inv) as u8;
                dst.0[3] = dst.0[3].max((alpha * 255.0) as u8);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_char(advance: u32) -> impl Fn(&str) -> u32 {
        move |s: &str| advance * s.chars().count() as u32
    }

    #[test]
    fn returns_text_unchanged_when_it_fits() {
        let measure = per_char(10);
        assert_eq!(fit_label(&measure, "abc", 30), "abc");
        assert_eq!(fit_label(&measure, "  abc  ", 30), "abc");
    }

    #[test]
    fn empty_input_is_empty_output() {
        let measure = per_char(10);
        assert_eq!(fit_label(&measure, "", 100), "");
        assert_eq!(fit_label(&measure, "   ", 100), "");
    }

    #[test]
    fn truncates_with_ellipsis() {
        // 12 px per char, 60 px budget: longest candidate is 5 chars total.
        let measure = per_char(12);
        let fitted = fit_label(&measure, "Flag: Canada", 60);
        assert_eq!(fitted, format!("Flag{ELLIPSIS}"));
        assert_eq!(measure.width_px(&fitted), 60);
    }

    #[test]
    fn ellipsis_alone_too_wide_yields_empty() {
        let measure = per_char(100);
        assert_eq!(fit_label(&measure, "abcdef", 60), "");
    }

    #[test]
    fn idempotent() {
        let measure = per_char(12);
        let once = fit_label(&measure, "Flag: Canada", 60);
        let twice = fit_label(&measure, &once, 60);
        assert_eq!(once, twice);
    }

    #[test]
    fn never_exceeds_budget() {
        let measure = per_char(7);
        for text in ["a", "hello world", "some very long label indeed", "…x…"] {
            for budget in [0u32, 7, 10, 14, 50, 200] {
                let fitted = fit_label(&measure, text, budget);
                if !fitted.is_empty() {
                    assert!(
                        measure.width_px(&fitted) <= budget,
                        "{fitted:?} overflows {budget}"
                    );
                }
            }
        }
    }
}
