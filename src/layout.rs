//! Sheet Layout Engine
//!
//! Packs an ordered run of tiles into a columns x rows grid. Column widths
//! and row heights are negotiated per line to the largest tile they hold;
//! offsets accumulate with the gap between cells only; each tile is
//! centered inside its cell when composed. The engine reads tile sizes and
//! nothing else.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::card::overlay_blend;
use crate::resource::ResourceCache;
use crate::text::LabelPainter;
use crate::tile::{RenderError, Tile};

/// Grid placement for one sheet. Derived per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLayout {
    /// Tiles actually placed (at most `columns * rows`).
    pub tile_count: usize,
    pub rows_used: u32,
    pub column_widths: Vec<u32>,
    pub row_heights: Vec<u32>,
    pub column_offsets: Vec<u32>,
    pub row_offsets: Vec<u32>,
    pub sheet_width: u32,
    pub sheet_height: u32,
}

/// Compute the grid for one page's worth of tiles.
///
/// `columns` and `rows` must already be clamped (see
/// [`crate::settings::SheetGeometry::clamped`]); the slice is truncated to
/// the grid capacity if longer.
pub fn compute_layout(tiles: &[Tile], columns: u32, rows: u32, gap: u32) -> SheetLayout {
    let capacity = (columns as usize) * (rows as usize);
    let used = &tiles[..tiles.len().min(capacity)];

    let rows_used = {
        let needed = (used.len() as u32).div_ceil(columns).max(1);
        needed.min(rows)
    };

    let mut column_widths = vec![0u32; columns as usize];
    let mut row_heights = vec![0u32; rows_used as usize];
    for (k, tile) in used.iter().enumerate() {
        let r = k / columns as usize;
        let c = k % columns as usize;
        column_widths[c] = column_widths[c].max(tile.width);
        row_heights[r] = row_heights[r].max(tile.height);
    }

    let mut column_offsets = Vec::with_capacity(columns as usize);
    let mut acc = 0u32;
    for &w in &column_widths {
        column_offsets.push(acc);
        acc += w + gap;
    }

    let mut row_offsets = Vec::with_capacity(rows_used as usize);
    let mut acc = 0u32;
    for &h in &row_heights {
        row_offsets.push(acc);
        acc += h + gap;
    }

    let sheet_width = column_widths.iter().sum::<u32>() + gap * (columns - 1);
    let sheet_height = row_heights.iter().sum::<u32>() + gap * (rows_used - 1);

    SheetLayout {
        tile_count: used.len(),
        rows_used,
        column_widths,
        row_heights,
        column_offsets,
        row_offsets,
        sheet_width: sheet_width.max(1),
        sheet_height: sheet_height.max(1),
    }
}

/// Render one page's tiles and composite them onto a single sheet surface.
///
/// Tiles are rendered strictly sequentially: they share the sheet surface
/// and their writes must not interleave. Each tile is centered within its
/// cell, which tolerates heterogeneous tile sizes on one sheet.
pub async fn compose_sheet(
    tiles: &[Tile],
    columns: u32,
    rows: u32,
    gap: u32,
    resources: &ResourceCache,
    painter: &dyn LabelPainter,
) -> Result<(RgbaImage, SheetLayout), RenderError> {
    let layout = compute_layout(tiles, columns, rows, gap);
    let mut sheet = RgbaImage::new(layout.sheet_width, layout.sheet_height);

    for (k, tile) in tiles[..layout.tile_count].iter().enumerate() {
        let r = k / columns as usize;
        let c = k % columns as usize;

        let rendered = tile.render(resources, painter).await?;

        let dx = layout.column_offsets[c] as i32
            + (layout.column_widths[c] as i32 - tile.width as i32) / 2;
        let dy = layout.row_offsets[r] as i32
            + (layout.row_heights[r] as i32 - tile.height as i32) / 2;
        overlay_blend(&mut sheet, &rendered, dx, dy);
    }

    Ok((sheet, layout))
}
