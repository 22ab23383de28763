//! Card Face Drawing
//!
//! Static frame (optional fill, rounded border), icon blit and fitted
//! label, all onto plain RGBA surfaces.

use image::{imageops, Rgba, RgbaImage};

use crate::settings::{Background, CardStyle, ModeASettings, ModeBSettings};
use crate::text::{fit_label, LabelPainter};

pub const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Vertical inset of the icon below the border in a combined card.
pub(crate) const ICON_TOP_INSET: u32 = 8;
/// Horizontal padding between border and label budget, each side.
pub(crate) const TEXT_INSET: u32 = 12;

/// Rounded-rectangle membership for a `w x h` box with corner radius `r`,
/// in local coordinates.
fn in_rounded_rect(x: i32, y: i32, w: i32, h: i32, r: i32) -> bool {
    if w <= 0 || h <= 0 || x < 0 || y < 0 || x >= w || y >= h {
        return false;
    }
    if r <= 0 {
        return true;
    }
    if x >= r && x < w - r {
        return true;
    }
    if y >= r && y < h - r {
        return true;
    }
    // corner quarter-circles
    let cx = if x < r { r - 1 } else { w - r };
    let cy = if y < r { r - 1 } else { h - r };
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy <= r * r
}

/// Clear the surface, fill a rounded background when the style asks for
/// one, then stroke the rounded border fully inside the surface bounds.
pub fn draw_card_frame(surface: &mut RgbaImage, style: &CardStyle) {
    let (w, h) = surface.dimensions();
    let radius = style.effective_radius(w, h) as i32;
    let (wi, hi) = (w as i32, h as i32);

    for pixel in surface.pixels_mut() {
        *pixel = CLEAR;
    }

    if style.background == Background::Filled {
        for y in 0..hi {
            for x in 0..wi {
                if in_rounded_rect(x, y, wi, hi, radius) {
                    surface.put_pixel(x as u32, y as u32, PAPER);
                }
            }
        }
    }

    let border = style.border_width.min(w.min(h) / 2) as i32;
    if border == 0 {
        return;
    }
    let inner_radius = (radius - border).max(0);
    for y in 0..hi {
        for x in 0..wi {
            let outer = in_rounded_rect(x, y, wi, hi, radius);
            let inner = in_rounded_rect(
                x - border,
                y - border,
                wi - 2 * border,
                hi - 2 * border,
                inner_radius,
            );
            if outer && !inner {
                surface.put_pixel(x as u32, y as u32, INK);
            }
        }
    }
}

/// Alpha-composite `src` over `dst` at `(x, y)`; out-of-bounds source
/// pixels are dropped.
pub(crate) fn overlay_blend(dst: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    for sy in 0..src.height() {
        for sx in 0..src.width() {
            let tx = x + sx as i32;
            let ty = y + sy as i32;
            if tx < 0 || ty < 0 {
                continue;
            }
            let (tx, ty) = (tx as u32, ty as u32);
            if tx >= dst.width() || ty >= dst.height() {
                continue;
            }

            let s = src.get_pixel(sx, sy);
            let src_a = s.0[3] as f32 / 255.0;
            if src_a <= 0.0 {
                continue;
            }

            let d = dst.get_pixel_mut(tx, ty);
            let dst_a = d.0[3] as f32 / 255.0;
            let out_a = src_a + dst_a * (1.0 - src_a);
            if out_a <= 0.0 {
                *d = CLEAR;
                continue;
            }
            let blend = |sc: u8, dc: u8| -> u8 {
                let sc = sc as f32 / 255.0;
                let dc = dc as f32 / 255.0;
                let out = (sc * src_a + dc * dst_a * (1.0 - src_a)) / out_a;
                (out * 255.0).clamp(0.0, 255.0) as u8
            };
            *d = Rgba([
                blend(s.0[0], d.0[0]),
                blend(s.0[1], d.0[1]),
                blend(s.0[2], d.0[2]),
                (out_a * 255.0).clamp(0.0, 255.0) as u8,
            ]);
        }
    }
}

/// Resize the icon to `size x size` and composite it at `(x, y)`.
fn blit_icon(surface: &mut RgbaImage, icon: &RgbaImage, size: u32, x: i32, y: i32) {
    if size == 0 {
        return;
    }
    let scaled = imageops::resize(icon, size, size, imageops::FilterType::Lanczos3);
    overlay_blend(surface, &scaled, x, y);
}

/// Mode A face: frame, icon centered at a fixed top inset, fitted label
/// below it.
pub fn draw_combined_card(
    surface: &mut RgbaImage,
    label: &str,
    icon: &RgbaImage,
    settings: &ModeASettings,
    painter: &dyn LabelPainter,
) {
    draw_card_frame(surface, &settings.style);

    let card_w = settings.card_width as i32;
    let icon_size = settings.icon_size;
    let top = (settings.style.border_width + ICON_TOP_INSET) as i32;
    blit_icon(
        surface,
        icon,
        icon_size,
        (card_w - icon_size as i32) / 2,
        top,
    );

    let px = settings.font_size as f32;
    let budget = settings
        .card_width
        .saturating_sub(2 * (settings.style.border_width + TEXT_INSET));
    let measure = |s: &str| painter.width_px(s, px);
    let fitted = fit_label(&measure, label, budget);
    painter.draw(
        surface,
        &fitted,
        px,
        card_w / 2,
        top + icon_size as i32 + settings.icon_text_gap as i32,
        INK,
    );
}

/// Mode B icon face: frame plus the icon centered on both axes.
pub fn draw_icon_card(surface: &mut RgbaImage, icon: &RgbaImage, settings: &ModeBSettings) {
    draw_card_frame(surface, &settings.style);
    let icon_size = settings.icon_size;
    blit_icon(
        surface,
        icon,
        icon_size,
        (settings.icon_card_width as i32 - icon_size as i32) / 2,
        (settings.icon_card_height as i32 - icon_size as i32) / 2,
    );
}

/// Mode B text face: frame plus the fitted label centered on both axes.
pub fn draw_text_card(
    surface: &mut RgbaImage,
    label: &str,
    settings: &ModeBSettings,
    painter: &dyn LabelPainter,
) {
    draw_card_frame(surface, &settings.style);

    let px = settings.font_size as f32;
    let budget = settings
        .text_card_width
        .saturating_sub(2 * (settings.style.border_width + TEXT_INSET));
    let measure = |s: &str| painter.width_px(s, px);
    let fitted = fit_label(&measure, label, budget);
    let line = painter.line_height_px(px) as i32;
    painter.draw(
        surface,
        &fitted,
        px,
        settings.text_card_width as i32 / 2,
        (settings.text_card_height as i32 - line) / 2,
        INK,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CardStyle;

    #[test]
    fn filled_frame_paints_background_and_border() {
        let style = CardStyle {
            border_width: 2,
            corner_radius: 0,
            background: Background::Filled,
        };
        let mut surface = RgbaImage::new(20, 10);
        draw_card_frame(&mut surface, &style);

        // border pixel
        assert_eq!(*surface.get_pixel(0, 0), INK);
        assert_eq!(*surface.get_pixel(19, 9), INK);
        // interior pixel
        assert_eq!(*surface.get_pixel(10, 5), PAPER);
    }

    #[test]
    fn transparent_frame_leaves_interior_clear() {
        let style = CardStyle {
            border_width: 1,
            corner_radius: 0,
            background: Background::Transparent,
        };
        let mut surface = RgbaImage::new(8, 8);
        draw_card_frame(&mut surface, &style);

        assert_eq!(*surface.get_pixel(0, 0), INK);
        assert_eq!(*surface.get_pixel(4, 4), CLEAR);
    }

    #[test]
    fn rounded_corner_is_outside_the_frame() {
        let style = CardStyle {
            border_width: 1,
            corner_radius: 6,
            background: Background::Filled,
        };
        let mut surface = RgbaImage::new(24, 24);
        draw_card_frame(&mut surface, &style);

        // the extreme corner pixel lies outside the rounded rect
        assert_eq!(*surface.get_pixel(0, 0), CLEAR);
        // the midpoint of an edge is border
        assert_eq!(*surface.get_pixel(12, 0), INK);
    }

    #[test]
    fn overlay_blend_respects_bounds() {
        let mut dst = RgbaImage::new(4, 4);
        let mut src = RgbaImage::new(2, 2);
        for p in src.pixels_mut() {
            *p = Rgba([10, 20, 30, 255]);
        }
        overlay_blend(&mut dst, &src, 3, 3);
        assert_eq!(*dst.get_pixel(3, 3), Rgba([10, 20, 30, 255]));
        assert_eq!(*dst.get_pixel(0, 0), Rgba([0, 0, 0, 0]));

        // negative offsets clip instead of panicking
        overlay_blend(&mut dst, &src, -1, -1);
        assert_eq!(*dst.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
    }
}
