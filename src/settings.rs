//! Card, Mode and Sheet Configuration

use serde::{Deserialize, Serialize};

/// Hard ceiling on grid columns and rows.
pub const MAX_GRID_DIM: i64 = 50;

/// One selectable entity: stable id, resolved label, icon locator.
///
/// Owned by the caller; this crate never stores items between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub label: String,
    pub image_locator: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        image_locator: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            image_locator: image_locator.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    Filled,
    Transparent,
}

/// Frame styling shared by every card face.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStyle {
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    #[serde(default = "default_corner_radius")]
    pub corner_radius: u32,
    #[serde(default)]
    pub background: Background,
}

fn default_border_width() -> u32 { 6 }
fn default_corner_radius() -> u32 { 18 }

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            border_width: default_border_width(),
            corner_radius: default_corner_radius(),
            background: Background::default(),
        }
    }
}

impl CardStyle {
    /// Corner radius usable on a `width x height` surface: the arc never
    /// exceeds half the short side.
    pub fn effective_radius(&self, width: u32, height: u32) -> u32 {
        self.corner_radius.min(width.min(height) / 2)
    }
}

/// Mode A: one combined card with the icon above a fitted label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeASettings {
    #[serde(default = "default_a_card_width")]
    pub card_width: u32,
    #[serde(default = "default_a_card_height")]
    pub card_height: u32,
    #[serde(default = "default_a_icon_size")]
    pub icon_size: u32,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_icon_text_gap")]
    pub icon_text_gap: u32,
    #[serde(flatten)]
    pub style: CardStyle,
}

fn default_a_card_width() -> u32 { 320 }
fn default_a_card_height() -> u32 { 260 }
fn default_a_icon_size() -> u32 { 120 }
fn default_font_size() -> u32 { 28 }
fn default_icon_text_gap() -> u32 { 10 }

impl Default for ModeASettings {
    fn default() -> Self {
        Self {
            card_width: default_a_card_width(),
            card_height: default_a_card_height(),
            icon_size: default_a_icon_size(),
            font_size: default_font_size(),
            icon_text_gap: default_icon_text_gap(),
            style: CardStyle::default(),
        }
    }
}

/// Mode B: two separate cards per item, one icon-only and one text-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeBSettings {
    #[serde(default = "default_b_icon_card_dim")]
    pub icon_card_width: u32,
    #[serde(default = "default_b_icon_card_dim")]
    pub icon_card_height: u32,
    #[serde(default = "default_b_icon_size")]
    pub icon_size: u32,
    #[serde(default = "default_b_icon_card_dim")]
    pub text_card_width: u32,
    #[serde(default = "default_b_text_card_height")]
    pub text_card_height: u32,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(flatten)]
    pub style: CardStyle,
}

fn default_b_icon_card_dim() -> u32 { 240 }
fn default_b_icon_size() -> u32 { 140 }
fn default_b_text_card_height() -> u32 { 140 }

impl Default for ModeBSettings {
    fn default() -> Self {
        Self {
            icon_card_width: default_b_icon_card_dim(),
            icon_card_height: default_b_icon_card_dim(),
            icon_size: default_b_icon_size(),
            text_card_width: default_b_icon_card_dim(),
            text_card_height: default_b_text_card_height(),
            font_size: default_font_size(),
            style: CardStyle::default(),
        }
    }
}

/// Whether a card combines icon and label in one tile (A) or splits them
/// into two tiles (B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    A,
    B,
}

/// Which subset of Mode B tiles a sheet or export pass includes.
/// Mode A always produces one combined tile per item regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    All,
    IconOnly,
    TextOnly,
}

/// Raw sheet grid parameters as supplied by the caller.
///
/// Values are NOT trusted as stored: every consumer goes through
/// [`SheetGeometry::clamped`], so out-of-range values entering through any
/// path (deserialization included) are harmless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetGeometry {
    #[serde(default = "default_columns")]
    pub columns: i64,
    #[serde(default = "default_rows")]
    pub rows: i64,
    #[serde(default = "default_gap")]
    pub gap: i64,
}

fn default_columns() -> i64 { 6 }
fn default_rows() -> i64 { 4 }
fn default_gap() -> i64 { 16 }

impl Default for SheetGeometry {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            rows: default_rows(),
            gap: default_gap(),
        }
    }
}

/// Grid parameters after clamping; the only form the engine computes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedGeometry {
    pub columns: u32,
    pub rows: u32,
    pub gap: u32,
}

impl ClampedGeometry {
    /// Tiles one sheet can hold.
    pub fn capacity(&self) -> usize {
        (self.columns as usize) * (self.rows as usize)
    }
}

impl SheetGeometry {
    pub fn new(columns: i64, rows: i64, gap: i64) -> Self {
        Self { columns, rows, gap }
    }

    /// Clamp on read: columns/rows into `[1, 50]`, gap to `>= 0`.
    pub fn clamped(&self) -> ClampedGeometry {
        ClampedGeometry {
            columns: self.columns.clamp(1, MAX_GRID_DIM) as u32,
            rows: self.rows.clamp(1, MAX_GRID_DIM) as u32,
            gap: self.gap.max(0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_clamps_on_read() {
        let g = SheetGeometry::new(0, 999, -7).clamped();
        assert_eq!(g.columns, 1);
        assert_eq!(g.rows, 50);
        assert_eq!(g.gap, 0);

        let g = SheetGeometry::new(6, 4, 16).clamped();
        assert_eq!((g.columns, g.rows, g.gap), (6, 4, 16));
        assert_eq!(g.capacity(), 24);
    }

    #[test]
    fn corner_radius_clamped_to_half_short_side() {
        let style = CardStyle {
            corner_radius: 500,
            ..CardStyle::default()
        };
        assert_eq!(style.effective_radius(100, 60), 30);
        assert_eq!(style.effective_radius(60, 100), 30);

        let style = CardStyle {
            corner_radius: 10,
            ..CardStyle::default()
        };
        assert_eq!(style.effective_radius(100, 60), 10);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let a: ModeASettings = serde_json::from_str("{}").unwrap();
        assert_eq!(a.card_width, 320);
        assert_eq!(a.card_height, 260);
        assert_eq!(a.style.border_width, 6);

        let b: ModeBSettings =
            serde_json::from_str(r#"{"textCardHeight": 90, "background": "transparent"}"#).unwrap();
        assert_eq!(b.text_card_height, 90);
        assert_eq!(b.style.background, Background::Transparent);
    }
}
