//! CardPress Core - Card & Sheet Composition Engine
//!
//! # The Five Rules (Non-Negotiable)
//! 1. Tiles Are The Only Render Unit
//! 2. Layout Is Deterministic
//! 3. Configuration Is Clamped, Never Trusted
//! 4. At Most One Fetch Per Locator
//! 5. Filenames Are Stable And Collision-Resistant

pub mod card;
pub mod export;
pub mod layout;
pub mod resource;
pub mod settings;
pub mod text;
pub mod tile;

pub use export::{
    page_count, to_data_url, DirSink, ExportBatch, ExportError, ExportPipeline, ExportedFile,
    FileSink, RenderGeneration, RenderTicket, SheetPreview,
};
pub use layout::{compute_layout, SheetLayout};
pub use resource::{
    CacheStats, HttpFetcher, IconImage, ResourceCache, ResourceError, ResourceFetcher,
};
pub use settings::{
    Background, CardStyle, ClampedGeometry, Item, Mode, ModeASettings, ModeBSettings,
    SheetGeometry, Variant,
};
pub use text::{fit_label, FontPainter, LabelPainter, TextMeasure, ELLIPSIS};
pub use tile::{build_tiles, sanitize_filename_part, ConfigurationError, RenderError, Tile, TileFace};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
