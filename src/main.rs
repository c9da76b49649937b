// iview - A minimal image viewer for Wayland
// Decodes a list of images in parallel, then pages through them in a single window

mod app;
mod cli;
mod files;
mod image_loader;
mod profiler;
mod render;
mod wayland;

use anyhow::Result;
use log::{info, warn};
use profiler::Profiler;

fn main() -> Result<()> {
    // Parse command line arguments (exits with usage on bad input)
    let args = cli::parse_args();

    // Errors and skipped files are always shown; -v adds progress output
    let level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut profiler = args.profile.as_deref().map(Profiler::create).transpose()?;

    // Expand directories and decode everything up front
    let files = files::find_files(&args.paths);
    info!("Decoding {} file(s)", files.len());

    let decoded = image_loader::decode_images(&files);
    if decoded.len() < files.len() {
        warn!("Skipped {} file(s) that could not be decoded", files.len() - decoded.len());
    }

    let images = decoded
        .into_iter()
        .map(|d| {
            if let Some(profiler) = profiler.as_mut() {
                profiler.add_measurement("decode", d.elapsed);
            }
            d.image
        })
        .collect();

    wayland::run(images, &args, profiler)
}
