//! Tile Factory
//!
//! A tile is one independently renderable card face: a strictly positive
//! size, a stable filename hint, and a face describing what to draw. The
//! (mode, variant) pairing is a closed strategy table; nothing else decides
//! which faces an item yields.

use image::RgbaImage;
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::card;
use crate::resource::{ResourceCache, ResourceError};
use crate::settings::{Item, Mode, ModeASettings, ModeBSettings, Variant};
use crate::text::LabelPainter;

/// Longest sanitized filename part.
const FILENAME_PART_MAX: usize = 80;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{what} dimensions must be positive, got {width}x{height}")]
    ZeroDimension {
        what: &'static str,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// What a tile draws. Closed over (mode, variant): Mode A items always
/// produce `Combined`; Mode B items produce `Icon` and/or `Text`.
#[derive(Debug, Clone)]
pub enum TileFace {
    Combined {
        item: Item,
        settings: ModeASettings,
    },
    Icon {
        item: Item,
        settings: ModeBSettings,
    },
    Text {
        item: Item,
        settings: ModeBSettings,
    },
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub filename_hint: String,
    pub face: TileFace,
}

impl Tile {
    /// Locator this tile will fetch when rendered, if any. Text-only faces
    /// never touch the resource cache.
    pub fn locator(&self) -> Option<&str> {
        match &self.face {
            TileFace::Combined { item, .. } | TileFace::Icon { item, .. } => {
                Some(&item.image_locator)
            }
            TileFace::Text { .. } => None,
        }
    }

    /// Render onto a freshly allocated surface of exactly `width x height`.
    /// Safe to call repeatedly; assumes nothing about prior drawing state.
    pub async fn render(
        &self,
        resources: &ResourceCache,
        painter: &dyn LabelPainter,
    ) -> Result<RgbaImage, RenderError> {
        let mut surface = RgbaImage::new(self.width, self.height);
        match &self.face {
            TileFace::Combined { item, settings } => {
                let icon = resources.get(&item.image_locator).await?;
                card::draw_combined_card(&mut surface, &item.label, &icon, settings, painter);
            }
            TileFace::Icon { item, settings } => {
                let icon = resources.get(&item.image_locator).await?;
                card::draw_icon_card(&mut surface, &icon, settings);
            }
            TileFace::Text { item, settings } => {
                card::draw_text_card(&mut surface, &item.label, settings, painter);
            }
        }
        Ok(surface)
    }
}

/// Strip diacritics and path-unsafe characters, collapse whitespace runs
/// to underscores, cap the length.
pub fn sanitize_filename_part(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    for ch in raw.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if matches!(
            ch,
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>'
        ) {
            continue;
        }
        stripped.push(ch);
    }

    let mut collapsed = String::with_capacity(stripped.len());
    let mut in_whitespace = false;
    for ch in stripped.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                collapsed.push('_');
            }
            in_whitespace = true;
        } else {
            collapsed.push(ch);
            in_whitespace = false;
        }
    }

    collapsed.chars().take(FILENAME_PART_MAX).collect()
}

fn ensure_positive(what: &'static str, width: u32, height: u32) -> Result<(), ConfigurationError> {
    if width == 0 || height == 0 {
        return Err(ConfigurationError::ZeroDimension { what, width, height });
    }
    Ok(())
}

/// Build the ordered tile list for one pass.
///
/// The index in filename hints is 1-based and increments once per item, so
/// both tiles of a Mode B "all" pair share it. Zero card dimensions are the
/// one configuration the factory rejects instead of clamping.
pub fn build_tiles(
    mode: Mode,
    items: &[Item],
    a: &ModeASettings,
    b: &ModeBSettings,
    variant: Variant,
) -> Result<Vec<Tile>, ConfigurationError> {
    match (mode, variant) {
        (Mode::A, _) => ensure_positive("combined card", a.card_width, a.card_height)?,
        (Mode::B, Variant::IconOnly) => {
            ensure_positive("icon card", b.icon_card_width, b.icon_card_height)?
        }
        (Mode::B, Variant::TextOnly) => {
            ensure_positive("text card", b.text_card_width, b.text_card_height)?
        }
        (Mode::B, Variant::All) => {
            ensure_positive("icon card", b.icon_card_width, b.icon_card_height)?;
            ensure_positive("text card", b.text_card_width, b.text_card_height)?;
        }
    }

    let mut tiles = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let index = i + 1;
        let label_part = if item.label.trim().is_empty() {
            "card".to_string()
        } else {
            sanitize_filename_part(&item.label)
        };
        let id_part = sanitize_filename_part(&item.id);
        let stem = format!("{index:03}_{label_part}_{id_part}");

        match (mode, variant) {
            (Mode::A, _) => {
                tiles.push(Tile {
                    width: a.card_width,
                    height: a.card_height,
                    filename_hint: format!("{stem}.png"),
                    face: TileFace::Combined {
                        item: item.clone(),
                        settings: *a,
                    },
                });
            }
            (Mode::B, Variant::IconOnly) => {
                tiles.push(icon_tile(item, b, &stem));
            }
            (Mode::B, Variant::TextOnly) => {
                tiles.push(text_tile(item, b, &stem));
            }
            (Mode::B, Variant::All) => {
                tiles.push(icon_tile(item, b, &stem));
                tiles.push(text_tile(item, b, &stem));
            }
        }
    }

    Ok(tiles)
}

fn icon_tile(item: &Item, b: &ModeBSettings, stem: &str) -> Tile {
    Tile {
        width: b.icon_card_width,
        height: b.icon_card_height,
        filename_hint: format!("{stem}_icon.png"),
        face: TileFace::Icon {
            item: item.clone(),
            settings: *b,
        },
    }
}

fn text_tile(item: &Item, b: &ModeBSettings, stem: &str) -> Tile {
    Tile {
        width: b.text_card_width,
        height: b.text_card_height,
        filename_hint: format!("{stem}_text.png"),
        face: TileFace::Text {
            item: item.clone(),
            settings: *b,
        },
    }
}
