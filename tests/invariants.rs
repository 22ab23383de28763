//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees: pagination, fitting,
//! tile pairing, filename stability and cache de-duplication.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use cardpress_core::{
    build_tiles, fit_label, page_count, ExportPipeline, FileSink, Item, LabelPainter, Mode,
    ModeASettings, ModeBSettings, ResourceCache, ResourceError, ResourceFetcher, SheetGeometry,
    TileFace, Variant, ELLIPSIS,
};

/// Minimal valid 1x1 transparent PNG.
const MINIMAL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Counts fetches; can fail the first call to exercise retry.
struct FakeFetcher {
    calls: AtomicU32,
    fail_first: bool,
}

impl FakeFetcher {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first: false,
        }
    }

    fn failing_once() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first: true,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_first && call == 1 {
            return Err(ResourceError::Fetch {
                locator: locator.to_string(),
                status: "503 Service Unavailable".to_string(),
            });
        }
        Ok(MINIMAL_PNG.to_vec())
    }
}

/// Fixed-advance painter: every char is `advance` px wide, drawing fills
/// nothing (pixel content is not under test here).
struct CellPainter {
    advance: u32,
}

impl CellPainter {
    fn new() -> Self {
        Self { advance: 10 }
    }
}

impl LabelPainter for CellPainter {
    fn width_px(&self, text: &str, _px: f32) -> u32 {
        self.advance * text.chars().count() as u32
    }

    fn line_height_px(&self, px: f32) -> u32 {
        px.max(1.0) as u32
    }

    fn draw(
        &self,
        _surface: &mut RgbaImage,
        _text: &str,
        _px: f32,
        _cx: i32,
        _top: i32,
        _color: Rgba<u8>,
    ) {
    }
}

/// Sink that keeps everything in memory.
#[derive(Default)]
struct MemorySink {
    files: Vec<(String, Vec<u8>)>,
}

impl FileSink for MemorySink {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.files.push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}

fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| {
            Item::new(
                format!("1F3{i:02X}"),
                format!("label {i}"),
                format!("mem://icons/{i}"),
            )
        })
        .collect()
}

fn pipeline_with(fetcher: Arc<FakeFetcher>) -> ExportPipeline {
    ExportPipeline::new(Arc::new(ResourceCache::new(fetcher)))
}

#[test]
fn invariant_pagination_law() {
    for columns in [1i64, 3, 6] {
        for rows in [1i64, 2, 4] {
            let geometry = SheetGeometry::new(columns, rows, 0);
            let capacity = (columns * rows) as usize;
            for tiles in 0..40usize {
                let expected = tiles.div_ceil(capacity).max(1);
                assert_eq!(page_count(tiles, &geometry), expected);
            }
        }
    }
}

#[test]
fn invariant_fit_label_binary_search_boundary() {
    // 12 px per char, 60 px budget: "Flag: Canada" keeps a 4-char prefix
    // and the ellipsis, landing exactly on the budget.
    let measure = |s: &str| 12 * s.chars().count() as u32;
    let fitted = fit_label(&measure, "Flag: Canada", 60);
    assert_eq!(fitted, format!("Flag{ELLIPSIS}"));
    assert_eq!(measure(&fitted), 60);

    // idempotent
    assert_eq!(fit_label(&measure, &fitted, 60), fitted);

    // a budget below the ellipsis yields the empty string
    assert_eq!(fit_label(&measure, "Flag: Canada", 11), "");
}

#[test]
fn invariant_mode_b_all_yields_icon_text_pairs() {
    let items = items(5);
    let tiles = build_tiles(
        Mode::B,
        &items,
        &ModeASettings::default(),
        &ModeBSettings::default(),
        Variant::All,
    )
    .unwrap();

    assert_eq!(tiles.len(), 10);
    for pair in tiles.chunks(2) {
        assert!(matches!(pair[0].face, TileFace::Icon { .. }));
        assert!(matches!(pair[1].face, TileFace::Text { .. }));
    }

    for variant in [Variant::IconOnly, Variant::TextOnly] {
        let tiles = build_tiles(
            Mode::B,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            variant,
        )
        .unwrap();
        assert_eq!(tiles.len(), 5);
    }
}

#[test]
fn invariant_filenames_unique_and_path_safe() {
    let items = vec![
        Item::new("1F1E8-1F1E6", "Flag: Canada", "mem://ca"),
        Item::new("1F384", "Árbol/de\\Navidad", "mem://tree"),
        Item::new("1F385", "Père Noël", "mem://santa"),
        Item::new("2764", "cœur", "mem://heart"),
    ];
    let tiles = build_tiles(
        Mode::B,
        &items,
        &ModeASettings::default(),
        &ModeBSettings::default(),
        Variant::All,
    )
    .unwrap();

    let mut seen = std::collections::HashSet::new();
    for tile in &tiles {
        assert!(
            seen.insert(tile.filename_hint.clone()),
            "duplicate filename {}",
            tile.filename_hint
        );
        assert!(!tile.filename_hint.contains('/'));
        assert!(!tile.filename_hint.contains('\\'));
        assert!(!tile.filename_hint.contains(':'));
    }
}

#[tokio::test]
async fn invariant_concurrent_gets_share_one_fetch() {
    let fetcher = Arc::new(FakeFetcher::new());
    let cache = ResourceCache::new(fetcher.clone());

    let (a, b) = tokio::join!(cache.get("mem://same"), cache.get("mem://same"));
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(fetcher.calls(), 1);

    // a later call is a pure hit
    cache.get("mem://same").await.unwrap();
    assert_eq!(fetcher.calls(), 1);
    assert!(cache.stats().hits >= 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn invariant_failed_fetch_evicts_and_retries() {
    let fetcher = Arc::new(FakeFetcher::failing_once());
    let cache = ResourceCache::new(fetcher.clone());

    let first = cache.get("mem://flaky").await;
    assert!(matches!(first, Err(ResourceError::Fetch { .. })));
    assert_eq!(cache.len().await, 0);

    let second = cache.get("mem://flaky").await;
    assert!(second.is_ok());
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test]
async fn invariant_undecodable_bytes_are_a_decode_error() {
    struct Garbage;
    #[async_trait]
    impl ResourceFetcher for Garbage {
        async fn fetch(&self, _locator: &str) -> Result<Vec<u8>, ResourceError> {
            Ok(vec![0xDE, 0xAD, 0xBE, 0xEF])
        }
    }

    let cache = ResourceCache::new(Arc::new(Garbage));
    let result = cache.get("mem://junk").await;
    assert!(matches!(result, Err(ResourceError::Decode { .. })));
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn invariant_seven_items_three_by_two_makes_two_pages() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher.clone());
    let painter = CellPainter::new();

    let items = items(7);
    let tiles = build_tiles(
        Mode::A,
        &items,
        &ModeASettings::default(),
        &ModeBSettings::default(),
        Variant::All,
    )
    .unwrap();
    let geometry = SheetGeometry::new(3, 2, 4);

    assert_eq!(page_count(tiles.len(), &geometry), 2);

    let (_, first) = pipeline
        .render_page(&tiles, &geometry, 0, &painter)
        .await
        .unwrap();
    assert_eq!(first.tile_count, 6);
    assert_eq!(first.rows_used, 2);

    let (_, second) = pipeline
        .render_page(&tiles, &geometry, 1, &painter)
        .await
        .unwrap();
    assert_eq!(second.tile_count, 1);
    assert_eq!(second.rows_used, 1);

    // 7 distinct locators, each fetched exactly once across both pages
    assert_eq!(fetcher.calls(), 7);
}

#[tokio::test]
async fn invariant_empty_selection_is_a_placeholder_page() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher.clone());
    let painter = CellPainter::new();

    let preview = pipeline
        .render_sheet_preview(
            Mode::A,
            &[],
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &SheetGeometry::default(),
            Variant::All,
            0,
            &painter,
        )
        .await
        .unwrap();

    assert_eq!(preview.total_pages, 1);
    assert_eq!(preview.image.dimensions(), (420, 240));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn invariant_preview_clamps_page_and_reports_totals() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher);
    let painter = CellPainter::new();

    let items = items(7);
    let preview = pipeline
        .render_sheet_preview(
            Mode::A,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &SheetGeometry::new(3, 2, 4),
            Variant::All,
            99,
            &painter,
        )
        .await
        .unwrap();

    assert_eq!(preview.total_pages, 2);
    assert_eq!(preview.page, 1);
}

#[tokio::test]
async fn invariant_per_card_export_uses_filename_hints() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher);
    let painter = CellPainter::new();
    let mut sink = MemorySink::default();

    let items = items(3);
    let batch = pipeline
        .export_cards(
            Mode::A,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &painter,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(sink.files.len(), 3);
    assert_eq!(batch.files.len(), 3);
    for ((filename, bytes), described) in sink.files.iter().zip(&batch.files) {
        assert_eq!(filename, &described.filename);
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!(described.byte_len, bytes.len());
        assert_eq!(described.hash.len(), 64);
    }
}

#[tokio::test]
async fn invariant_sheet_export_names_pages() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher);
    let painter = CellPainter::new();
    let mut sink = MemorySink::default();

    let items = items(7);
    let batch = pipeline
        .export_sheets(
            Mode::A,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &SheetGeometry::new(3, 2, 4),
            Variant::All,
            None,
            &painter,
            &mut sink,
        )
        .await
        .unwrap();

    let names: Vec<_> = sink.files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["sheet_01_of_02.png", "sheet_02_of_02.png"]);
    assert_eq!(batch.files.len(), 2);
    assert_eq!(batch.engine_version, cardpress_core::ENGINE_VERSION);
}

#[tokio::test]
async fn invariant_sheet_export_honors_prefix_and_variant() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher.clone());
    let painter = CellPainter::new();

    let items = items(2);

    let mut sink = MemorySink::default();
    pipeline
        .export_sheets(
            Mode::B,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &SheetGeometry::new(6, 4, 16),
            Variant::TextOnly,
            None,
            &painter,
            &mut sink,
        )
        .await
        .unwrap();
    assert_eq!(sink.files[0].0, "sheet_texts_01_of_01.png");
    // text-only sheets never touch the resource cache
    assert_eq!(fetcher.calls(), 0);

    let mut sink = MemorySink::default();
    pipeline
        .export_sheets(
            Mode::B,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &SheetGeometry::new(6, 4, 16),
            Variant::IconOnly,
            Some("icon_run"),
            &painter,
            &mut sink,
        )
        .await
        .unwrap();
    assert_eq!(sink.files[0].0, "icon_run_01_of_01.png");
}

#[tokio::test]
async fn invariant_dir_sink_writes_files() {
    let fetcher = Arc::new(FakeFetcher::new());
    let pipeline = pipeline_with(fetcher);
    let painter = CellPainter::new();

    let dir = tempfile::tempdir().unwrap();
    let mut sink = cardpress_core::DirSink::new(dir.path());

    let items = items(1);
    pipeline
        .export_cards(
            Mode::A,
            &items,
            &ModeASettings::default(),
            &ModeBSettings::default(),
            &painter,
            &mut sink,
        )
        .await
        .unwrap();

    let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(written.len(), 1);
}
