use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "text-overlay-rust",
    version,
    about = "Overlay translated text blocks onto an image"
)]
struct Cli {
    /// Base image to draw on
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// Block descriptor JSON (array, or object with "blocks"/"text_blocks")
    #[arg(short = 'b', long = "blocks")]
    blocks: PathBuf,

    /// Output image; the format follows the extension (png, jpg, webp, bmp, tiff, gif)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Font file path or family name (overrides settings [font])
    #[arg(short = 'f', long = "font")]
    font: Option<String>,

    /// Keep descriptor boxes as given instead of fitting them to the text
    #[arg(long = "no-auto-fit")]
    no_auto_fit: bool,

    /// Write the final (fitted) blocks as JSON
    #[arg(long = "dump-blocks")]
    dump_blocks: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    text_overlay_rust::logging::init(cli.verbose)?;

    let report = text_overlay_rust::run(text_overlay_rust::Config {
        image: cli.image,
        blocks: cli.blocks,
        output: cli.output,
        settings_path: cli.read_settings,
        font: cli.font,
        no_auto_fit: cli.no_auto_fit,
        dump_blocks: cli.dump_blocks,
    })?;

    for entry in &report.rejected {
        eprintln!("skipped block {}: {}", entry.index, entry.reason);
    }
    println!("{} ({} blocks drawn)", report.output.display(), report.drawn);
    Ok(())
}
