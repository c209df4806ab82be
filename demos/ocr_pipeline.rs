//! Page OCR example using the cascade pipeline.
//!
//! Loads the models (from the cache, a URL or a local directory), runs every
//! image through layout detection, cascade recognition and reading-order
//! assembly, and prints the text of each page.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ocr_pipeline -- \
//!     --models https://example.com/models \
//!     page1.png page2.jpg
//! ```
//!
//! With a JSON configuration file and horizontal text:
//!
//! ```bash
//! cargo run --example ocr_pipeline -- \
//!     --config pipeline.json \
//!     --direction horizontal \
//!     page.png
//! ```

use cascade_ocr::core::init_tracing;
use cascade_ocr::domain::WritingDirection;
use cascade_ocr::pipeline::{OcrPipeline, OcrWorker, PipelineEvent};
use cascade_ocr::prelude::{ParallelPolicy, PipelineConfig};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Command-line arguments for the OCR pipeline example.
#[derive(Parser)]
#[command(name = "ocr_pipeline")]
#[command(about = "Cascade OCR Pipeline Example - layout, recognition and reading order")]
struct Args {
    /// Image files to process, in order.
    #[arg(required = true)]
    images: Vec<String>,

    /// JSON pipeline configuration. Flags below override it.
    #[arg(long)]
    config: Option<String>,

    /// Base URL or directory holding the model artifacts.
    #[arg(long)]
    models: Option<String>,

    /// Model cache directory.
    #[arg(long)]
    cache_dir: Option<String>,

    /// Number of recognition workers. 1 recognizes on the pipeline thread.
    #[arg(long)]
    workers: Option<usize>,

    /// Writing direction: auto, vertical or horizontal.
    #[arg(long, default_value = "auto")]
    direction: String,

    /// Print every block with its reading order and box.
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(models) = args.models {
        config.source = config.source.with_base(models);
    }
    if let Some(dir) = args.cache_dir {
        config.source = config.source.with_cache_dir(dir);
    }
    if args.workers.is_some() {
        config.parallel = ParallelPolicy {
            recognition_workers: args.workers,
            ..config.parallel
        };
    }
    config.writing_direction = args.direction.parse::<WritingDirection>()?;

    let existing: Vec<&String> = args
        .images
        .iter()
        .filter(|path| {
            let exists = Path::new(path).exists();
            if !exists {
                error!("Image file not found: {}", path);
            }
            exists
        })
        .collect();
    if existing.is_empty() {
        return Err("No valid image files found".into());
    }

    let mut worker = OcrWorker::spawn(OcrPipeline::from_config(config)?)?;
    worker.initialize(|event| {
        if let PipelineEvent::Progress { progress, .. } = event {
            info!("Loading models: {:.0}%", progress * 100.0);
        }
    })?;

    let mut loaded = Vec::with_capacity(existing.len());
    let mut pages = Vec::with_capacity(existing.len());
    for path in existing {
        match image::open(path) {
            Ok(img) => {
                loaded.push(path);
                pages.push(Arc::new(img.to_rgb8()));
            }
            Err(e) => error!("Failed to load {}: {}", path, e),
        }
    }

    let results = worker.process_batch(pages, |event| {
        if let PipelineEvent::Progress {
            stage, progress, ..
        } = event
        {
            info!("{stage}: {:.0}%", progress * 100.0);
        }
    });

    for (path, result) in loaded.into_iter().zip(results) {
        match result {
            Ok(page) => {
                println!("== {} ({} ms)", path, page.elapsed_ms);
                if args.verbose {
                    for block in &page.blocks {
                        let b = block.bbox();
                        println!(
                            "[{}] ({}, {}, {}x{}) {}",
                            block.reading_order, b.x, b.y, b.width, b.height, block.text
                        );
                    }
                } else {
                    println!("{}", page.full_text);
                }
            }
            Err(e) => error!("{}: {}", path, e),
        }
    }

    worker.terminate();
    Ok(())
}
