//! Export Orchestration - Single Entry Point for Output
//!
//! Drives the tile factory and the sheet layout engine to produce either
//! one PNG per card or paginated sheet PNGs, and delivers them through a
//! [`FileSink`]. Every batch comes back with a manifest describing the
//! emitted files.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;

use crate::layout::{compose_sheet, compute_layout, SheetLayout};
use crate::resource::{ResourceCache, ResourceError};
use crate::settings::{Item, Mode, ModeASettings, ModeBSettings, SheetGeometry, Variant};
use crate::text::LabelPainter;
use crate::tile::{build_tiles, ConfigurationError, RenderError, Tile};
use crate::ENGINE_VERSION;

/// Fallback surface dimensions for empty selections and failed previews.
const FALLBACK_WIDTH: u32 = 420;
const FALLBACK_HEIGHT: u32 = 240;
const FALLBACK_FONT_PX: f32 = 16.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("file delivery failed: {0}")]
    Sink(#[from] std::io::Error),

    #[error("render superseded by a newer request")]
    Superseded,

    #[error("prefetch task failed: {0}")]
    Prefetch(String),
}

/// Delivery seam for finished files. Download, disk write or stream is the
/// collaborator's concern; the engine only promises deterministic,
/// collision-resistant filenames and well-formed image bytes.
pub trait FileSink {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<(), std::io::Error>;
}

/// Sink that writes into a directory, creating it on first use.
pub struct DirSink {
    dir: std::path::PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSink for DirSink {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(filename), bytes)
    }
}

/// One emitted file, described for the batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub filename: String,
    pub format: String,
    pub size: [u32; 2],
    pub byte_len: usize,
    pub hash: String,
}

/// Manifest for one export batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBatch {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub files: Vec<ExportedFile>,
}

impl ExportBatch {
    fn new(files: Vec<ExportedFile>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            files,
        }
    }
}

/// A rendered sheet page plus the pagination facts a caller needs to drive
/// page controls without re-deriving tile counts.
pub struct SheetPreview {
    pub image: RgbaImage,
    pub page: usize,
    pub total_pages: usize,
}

/// Monotonic generation counter. A long render captures a ticket up front;
/// any newer ticket makes it stale, and stale renders bail out with
/// [`ExportError::Superseded`] instead of touching output.
#[derive(Debug, Default)]
pub struct RenderGeneration {
    counter: AtomicU64,
}

impl RenderGeneration {
    pub fn begin(&self) -> RenderTicket<'_> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        RenderTicket {
            id,
            counter: &self.counter,
        }
    }
}

pub struct RenderTicket<'a> {
    id: u64,
    counter: &'a AtomicU64,
}

impl RenderTicket<'_> {
    pub fn is_stale(&self) -> bool {
        self.counter.load(Ordering::SeqCst) != self.id
    }

    fn ensure_current(&self) -> Result<(), ExportError> {
        if self.is_stale() {
            Err(ExportError::Superseded)
        } else {
            Ok(())
        }
    }
}

/// Total pages for a tile count under a geometry; at least 1 even for an
/// empty list, so "page 1 of 1" is always well defined.
pub fn page_count(tile_count: usize, geometry: &SheetGeometry) -> usize {
    let capacity = geometry.clamped().capacity();
    tile_count.div_ceil(capacity).max(1)
}

fn default_sheet_prefix(variant: Variant) -> &'static str {
    match variant {
        Variant::All => "sheet",
        Variant::IconOnly => "sheet_icons",
        Variant::TextOnly => "sheet_texts",
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    surface
        .write_to(
            &mut Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Wrap PNG bytes as a `data:` URL.
pub fn to_data_url(png: &[u8]) -> String {
    use base64::Engine as _;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

/// The export pipeline - every card, sheet and preview render funnels
/// through here.
pub struct ExportPipeline {
    resources: Arc<ResourceCache>,
    generation: RenderGeneration,
}

impl ExportPipeline {
    pub fn new(resources: Arc<ResourceCache>) -> Self {
        Self {
            resources,
            generation: RenderGeneration::default(),
        }
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    /// Fetch every distinct locator used by the slice concurrently and wait
    /// for all of them, so the sequential composition that follows never
    /// stalls on the network.
    async fn prefetch(&self, tiles: &[Tile]) -> Result<(), ExportError> {
        let mut locators: Vec<String> = tiles
            .iter()
            .filter_map(|t| t.locator())
            .map(str::to_string)
            .collect();
        locators.sort();
        locators.dedup();
        if locators.is_empty() {
            return Ok(());
        }

        let mut inflight = JoinSet::new();
        for locator in locators {
            let cache = self.resources.clone();
            inflight.spawn(async move { cache.get(&locator).await.map(|_| ()) });
        }
        while let Some(joined) = inflight.join_next().await {
            joined.map_err(|e| ExportError::Prefetch(e.to_string()))??;
        }
        Ok(())
    }

    /// Render one page of the tile list. The page index is clamped into
    /// `[0, total - 1]`.
    pub async fn render_page(
        &self,
        tiles: &[Tile],
        geometry: &SheetGeometry,
        page: usize,
        painter: &dyn LabelPainter,
    ) -> Result<(RgbaImage, SheetLayout), ExportError> {
        let g = geometry.clamped();
        let total = page_count(tiles.len(), geometry);
        let page = page.min(total - 1);
        let capacity = g.capacity();
        let slice = &tiles[(page * capacity).min(tiles.len())..((page + 1) * capacity).min(tiles.len())];

        let ticket = self.generation.begin();
        self.prefetch(slice).await?;
        ticket.ensure_current()?;

        let (sheet, layout) = compose_sheet(slice, g.columns, g.rows, g.gap, &self.resources, painter).await?;
        ticket.ensure_current()?;

        debug!(page, total, tiles = layout.tile_count, "rendered sheet page");
        Ok((sheet, layout))
    }

    /// Export every tile as its own PNG, named by its filename hint.
    /// Mode B items yield their icon and text cards back to back.
    pub async fn export_cards(
        &self,
        mode: Mode,
        items: &[Item],
        a: &ModeASettings,
        b: &ModeBSettings,
        painter: &dyn LabelPainter,
        sink: &mut dyn FileSink,
    ) -> Result<ExportBatch, ExportError> {
        let tiles = build_tiles(mode, items, a, b, Variant::All)?;
        let ticket = self.generation.begin();
        self.prefetch(&tiles).await?;
        ticket.ensure_current()?;

        let mut files = Vec::with_capacity(tiles.len());
        for tile in &tiles {
            let image = tile.render(&self.resources, painter).await?;
            ticket.ensure_current()?;
            let png = encode_png(&image)?;
            sink.deliver(&tile.filename_hint, &png)?;
            files.push(ExportedFile {
                filename: tile.filename_hint.clone(),
                format: "png".to_string(),
                size: [tile.width, tile.height],
                byte_len: png.len(),
                hash: sha256_hex(&png),
            });
        }

        debug!(count = files.len(), "exported cards");
        Ok(ExportBatch::new(files))
    }

    /// Export paginated sheets: one PNG per page, named
    /// `{prefix}_{page:02}_of_{total:02}.png`.
    pub async fn export_sheets(
        &self,
        mode: Mode,
        items: &[Item],
        a: &ModeASettings,
        b: &ModeBSettings,
        geometry: &SheetGeometry,
        variant: Variant,
        filename_prefix: Option<&str>,
        painter: &dyn LabelPainter,
        sink: &mut dyn FileSink,
    ) -> Result<ExportBatch, ExportError> {
        let tiles = build_tiles(mode, items, a, b, variant)?;
        let g = geometry.clamped();
        let total = page_count(tiles.len(), geometry);
        let prefix = filename_prefix.unwrap_or_else(|| default_sheet_prefix(variant));

        let ticket = self.generation.begin();
        self.prefetch(&tiles).await?;
        ticket.ensure_current()?;

        let capacity = g.capacity();
        let mut files = Vec::with_capacity(total);
        for page in 0..total {
            let slice =
                &tiles[(page * capacity).min(tiles.len())..((page + 1) * capacity).min(tiles.len())];
            let (sheet, layout) =
                compose_sheet(slice, g.columns, g.rows, g.gap, &self.resources, painter).await?;
            ticket.ensure_current()?;

            let png = encode_png(&sheet)?;
            let filename = format!("{prefix}_{:02}_of_{total:02}.png", page + 1);
            sink.deliver(&filename, &png)?;
            files.push(ExportedFile {
                filename,
                format: "png".to_string(),
                size: [layout.sheet_width, layout.sheet_height],
                byte_len: png.len(),
                hash: sha256_hex(&png),
            });
        }

        debug!(pages = total, "exported sheets");
        Ok(ExportBatch::new(files))
    }

    /// Render one sheet page for display.
    ///
    /// Identical to per-sheet export for a single clamped page index, and
    /// resilient: an empty selection or a failed render yields a
    /// deterministic fallback surface instead of stale content. Only
    /// supersession surfaces as an error.
    pub async fn render_sheet_preview(
        &self,
        mode: Mode,
        items: &[Item],
        a: &ModeASettings,
        b: &ModeBSettings,
        geometry: &SheetGeometry,
        variant: Variant,
        page: usize,
        painter: &dyn LabelPainter,
    ) -> Result<SheetPreview, ExportError> {
        let tiles = match build_tiles(mode, items, a, b, variant) {
            Ok(tiles) => tiles,
            Err(_) => {
                return Ok(SheetPreview {
                    image: fallback_surface("Preview unavailable.", painter),
                    page: 0,
                    total_pages: 1,
                })
            }
        };
        if tiles.is_empty() {
            return Ok(SheetPreview {
                image: fallback_surface("Nothing selected.", painter),
                page: 0,
                total_pages: 1,
            });
        }

        let total = page_count(tiles.len(), geometry);
        let page = page.min(total - 1);
        match self.render_page(&tiles, geometry, page, painter).await {
            Ok((image, _)) => Ok(SheetPreview {
                image,
                page,
                total_pages: total,
            }),
            Err(ExportError::Superseded) => Err(ExportError::Superseded),
            Err(err) => {
                debug!(error = %err, "preview render failed, emitting fallback");
                Ok(SheetPreview {
                    image: fallback_surface("Preview unavailable.", painter),
                    page,
                    total_pages: total,
                })
            }
        }
    }

    /// Render the first tile of one item, for a single-card preview. For
    /// Mode B that is the icon card.
    pub async fn render_card_preview(
        &self,
        mode: Mode,
        item: &Item,
        a: &ModeASettings,
        b: &ModeBSettings,
        painter: &dyn LabelPainter,
    ) -> Result<RgbaImage, ExportError> {
        let items = [item.clone()];
        let tiles = build_tiles(mode, &items, a, b, Variant::All)?;
        let ticket = self.generation.begin();
        let image = tiles[0].render(&self.resources, painter).await?;
        ticket.ensure_current()?;
        Ok(image)
    }
}

/// Fixed-size surface carrying an explanatory message; used when there is
/// nothing to render or a preview failed.
pub fn fallback_surface(message: &str, painter: &dyn LabelPainter) -> RgbaImage {
    let mut surface = RgbaImage::new(FALLBACK_WIDTH, FALLBACK_HEIGHT);
    let line = painter.line_height_px(FALLBACK_FONT_PX) as i32;
    let width = painter.width_px(message, FALLBACK_FONT_PX) as i32;
    painter.draw(
        &mut surface,
        message,
        FALLBACK_FONT_PX,
        12 + width / 2,
        30 - line / 2,
        crate::card::INK,
    );
    surface
}

/// First page of the tile list, laid out but not rendered; cheap geometry
/// inspection for hosts that only need numbers.
pub fn inspect_layout(tiles: &[Tile], geometry: &SheetGeometry) -> (SheetLayout, usize) {
    let g = geometry.clamped();
    let layout = compute_layout(tiles, g.columns, g.rows, g.gap);
    (layout, page_count(tiles.len(), geometry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_floor_is_one() {
        let geometry = SheetGeometry::new(3, 2, 0);
        assert_eq!(page_count(0, &geometry), 1);
        assert_eq!(page_count(1, &geometry), 1);
        assert_eq!(page_count(6, &geometry), 1);
        assert_eq!(page_count(7, &geometry), 2);
        assert_eq!(page_count(13, &geometry), 3);
    }

    #[test]
    fn tickets_go_stale_when_superseded() {
        let generation = RenderGeneration::default();
        let first = generation.begin();
        assert!(!first.is_stale());

        let second = generation.begin();
        assert!(first.is_stale());
        assert!(!second.is_stale());
        assert!(matches!(
            first.ensure_current(),
            Err(ExportError::Superseded)
        ));
    }

    #[test]
    fn data_url_wraps_png_bytes() {
        let url = to_data_url(&[1, 2, 3]);
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn sha256_is_stable() {
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc"));
        assert_ne!(sha256_hex(b"abc"), sha256_hex(b"abd"));
        assert_eq!(sha256_hex(b"abc").len(), 64);
    }

    #[test]
    fn sheet_prefix_follows_variant() {
        assert_eq!(default_sheet_prefix(Variant::All), "sheet");
        assert_eq!(default_sheet_prefix(Variant::IconOnly), "sheet_icons");
        assert_eq!(default_sheet_prefix(Variant::TextOnly), "sheet_texts");
    }
}
