//! CardPress CLI
//!
//! Commands: layout, cards, sheets
//! Outputs JSON to stdout
//! Returns non-zero on failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Deserialize;

use cardpress_core::{
    export::inspect_layout, DirSink, ExportPipeline, FontPainter, Item, Mode, ModeASettings,
    ModeBSettings, ResourceCache, SheetGeometry, Variant,
};

#[derive(Parser)]
#[command(name = "cardpress-cli")]
#[command(about = "CardPress CLI - Card & Sheet Composition Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output directory for rendered files
    #[arg(short, long, default_value = "export")]
    out_dir: PathBuf,

    /// TTF/OTF font used for labels (required by rendering commands)
    #[arg(short, long)]
    font: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the first-page layout and page count without rendering
    Layout {
        /// JSON payload (ExportPayload)
        #[arg(short, long)]
        payload: String,
    },

    /// Export one PNG per card
    Cards {
        /// JSON payload (ExportPayload)
        #[arg(short, long)]
        payload: String,
    },

    /// Export paginated sheet PNGs
    Sheets {
        /// JSON payload (ExportPayload)
        #[arg(short, long)]
        payload: String,

        /// Filename prefix; derived from the variant when omitted
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportPayload {
    items: Vec<Item>,
    mode: Mode,
    #[serde(default)]
    a: ModeASettings,
    #[serde(default)]
    b: ModeBSettings,
    #[serde(default)]
    sheet: SheetGeometry,
    #[serde(default)]
    variant: Variant,
}

fn parse_payload(raw: &str) -> Result<ExportPayload, ExitCode> {
    serde_json::from_str(raw).map_err(|e| {
        println!(r#"{{"success": false, "error": "Invalid payload: {e}"}}"#);
        ExitCode::FAILURE
    })
}

fn load_painter(font: Option<&PathBuf>) -> Result<FontPainter, ExitCode> {
    let Some(path) = font else {
        println!(r#"{{"success": false, "error": "A --font file is required to render"}}"#);
        return Err(ExitCode::FAILURE);
    };
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!(r#"{{"success": false, "error": "Failed to read font: {e}"}}"#);
            return Err(ExitCode::FAILURE);
        }
    };
    match FontPainter::from_bytes(bytes) {
        Some(painter) => Ok(painter),
        None => {
            println!(r#"{{"success": false, "error": "Font file is not a usable TTF/OTF"}}"#);
            Err(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pipeline = ExportPipeline::new(Arc::new(ResourceCache::with_http_fetcher()));

    match cli.command {
        Commands::Layout { payload } => {
            let payload = match parse_payload(&payload) {
                Ok(p) => p,
                Err(code) => return code,
            };
            let tiles = match cardpress_core::build_tiles(
                payload.mode,
                &payload.items,
                &payload.a,
                &payload.b,
                payload.variant,
            ) {
                Ok(tiles) => tiles,
                Err(e) => {
                    println!(r#"{{"success": false, "error": "{e}"}}"#);
                    return ExitCode::from(2);
                }
            };
            let (layout, total_pages) = inspect_layout(&tiles, &payload.sheet);
            let output = serde_json::json!({
                "success": true,
                "tileCount": tiles.len(),
                "totalPages": total_pages,
                "firstPage": layout,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Cards { payload } => {
            let payload = match parse_payload(&payload) {
                Ok(p) => p,
                Err(code) => return code,
            };
            let painter = match load_painter(cli.font.as_ref()) {
                Ok(p) => p,
                Err(code) => return code,
            };
            let mut sink = DirSink::new(&cli.out_dir);
            match pipeline
                .export_cards(
                    payload.mode,
                    &payload.items,
                    &payload.a,
                    &payload.b,
                    &painter,
                    &mut sink,
                )
                .await
            {
                Ok(batch) => {
                    let output = serde_json::json!({ "success": true, "batch": batch });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"success": false, "error": "{e}"}}"#);
                    ExitCode::from(2)
                }
            }
        }

        Commands::Sheets { payload, prefix } => {
            let payload = match parse_payload(&payload) {
                Ok(p) => p,
                Err(code) => return code,
            };
            let painter = match load_painter(cli.font.as_ref()) {
                Ok(p) => p,
                Err(code) => return code,
            };
            let mut sink = DirSink::new(&cli.out_dir);
            match pipeline
                .export_sheets(
                    payload.mode,
                    &payload.items,
                    &payload.a,
                    &payload.b,
                    &payload.sheet,
                    payload.variant,
                    prefix.as_deref(),
                    &painter,
                    &mut sink,
                )
                .await
            {
                Ok(batch) => {
                    let output = serde_json::json!({ "success": true, "batch": batch });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"success": false, "error": "{e}"}}"#);
                    ExitCode::from(2)
                }
            }
        }
    }
}
