// Image loading module
// Decodes image files in parallel, one thread per file

use crate::files::file_name;
use crate::render::composite_over_background;
use image::{ImageFormat, RgbaImage};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Loaded image data ready for display
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Display name (base name of the file)
    pub name: String,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Format detected from the file contents
    pub format: ImageFormat,
    /// Pixel data in buffer byte order (B, G, R, A), composited over the background
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn from_rgba(name: String, format: ImageFormat, rgba: RgbaImage) -> Self {
        let (width, height) = rgba.dimensions();
        Self {
            name,
            width,
            height,
            format,
            pixels: composite_over_background(rgba),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Reasons a single file is skipped
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not detect an image format for '{path}': {source}")]
    UnknownFormat {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Could not decode '{path}' into a supported image format: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image '{path}' has no pixels")]
    Empty { path: PathBuf },
}

/// A successfully decoded image and how long decoding took
#[derive(Debug)]
pub struct Decoded {
    pub image: ImageData,
    pub elapsed: Duration,
}

/// Read and decode a single image file, detecting the format from its contents
pub fn decode_image(path: &Path) -> Result<ImageData, LoadError> {
    let data = fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let format = image::guess_format(&data).map_err(|source| LoadError::UnknownFormat {
        path: path.to_path_buf(),
        source,
    })?;

    let img = image::load_from_memory_with_format(&data, format).map_err(|source| {
        LoadError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })?;

    if img.width() == 0 || img.height() == 0 {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(ImageData::from_rgba(file_name(path), format, img.to_rgba8()))
}

/// Start one decode thread for `path`.
///
/// The returned channel is a rendezvous channel owned by that thread alone:
/// it yields the decoded image, or disconnects without a value on failure.
fn spawn_decode(path: PathBuf) -> Receiver<Decoded> {
    let (tx, rx) = mpsc::sync_channel(0);
    let name = format!("decode-{}", file_name(&path));
    let display = path.display().to_string();
    let spawned = thread::Builder::new().name(name).spawn(move || {
        let start = Instant::now();
        match decode_image(&path) {
            Ok(image) => {
                let elapsed = start.elapsed();
                info!(
                    "Decoded '{}' into image type '{:?}' ({:?})",
                    path.display(),
                    image.format,
                    elapsed
                );
                // The receiver only goes away if the collector is gone
                let _ = tx.send(Decoded { image, elapsed });
            }
            Err(e) => warn!("{}", e),
        }
    });
    match spawned {
        Ok(_) => rx,
        Err(e) => spawn_failed(&display, e),
    }
}

/// The OS refused a decode thread: skip the file instead of aborting.
/// The sender went down with the failed closure, so the channel is disconnected.
fn spawn_failed(path: &str, err: std::io::Error) -> Receiver<Decoded> {
    warn!("Could not start a decode thread for '{}': {}", path, err);
    let (_, rx) = mpsc::sync_channel(0);
    rx
}

/// Receive from each channel in order; a disconnected channel is a skipped file
fn collect(receivers: Vec<Receiver<Decoded>>) -> Vec<Decoded> {
    receivers
        .into_iter()
        .filter_map(|rx| rx.recv().ok())
        .collect()
}

/// Decode all files in parallel and collect the successes in input order.
///
/// Files that cannot be read or decoded are skipped, so the result may be
/// shorter than `paths`.
pub fn decode_images(paths: &[PathBuf]) -> Vec<Decoded> {
    let receivers: Vec<Receiver<Decoded>> =
        paths.iter().cloned().map(spawn_decode).collect();

    collect(receivers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_decode_image_reads_dimensions_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "tiny.png", 3, 2);

        let image = decode_image(&path).unwrap();
        assert_eq!(image.name, "tiny.png");
        assert_eq!(image.size(), (3, 2));
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.pixels.len(), 3 * 2 * 4);
        assert_eq!(&image.pixels[0..4], &[3, 2, 1, 255]);
    }

    #[test]
    fn test_format_comes_from_contents_not_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "tiny.png", 1, 1);
        let renamed = dir.path().join("really_a_png.jpg");
        fs::rename(&path, &renamed).unwrap();

        assert_eq!(decode_image(&renamed).unwrap().format, ImageFormat::Png);
    }

    #[test]
    fn test_decode_image_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.png");
        assert!(matches!(decode_image(&missing), Err(LoadError::Read { .. })));

        let text = dir.path().join("notes.txt");
        fs::write(&text, "definitely not pixels").unwrap();
        assert!(matches!(decode_image(&text), Err(LoadError::UnknownFormat { .. })));

        let truncated = dir.path().join("truncated.png");
        let full = fs::read(write_png(dir.path(), "full.png", 8, 8)).unwrap();
        fs::write(&truncated, &full[..full.len() / 2]).unwrap();
        assert!(matches!(decode_image(&truncated), Err(LoadError::Decode { .. })));
    }

    #[test]
    fn test_decode_images_keeps_valid_files_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.png");
        fs::write(&bogus, "nope").unwrap();

        let paths = vec![
            write_png(dir.path(), "c.png", 3, 3),
            dir.path().join("missing.gif"),
            write_png(dir.path(), "a.png", 1, 1),
            bogus,
            write_png(dir.path(), "b.png", 2, 2),
        ];

        let names: Vec<String> = decode_images(&paths)
            .into_iter()
            .map(|d| d.image.name)
            .collect();
        assert_eq!(names, vec!["c.png", "a.png", "b.png"]);
    }

    #[test]
    fn test_failed_spawn_is_skipped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = spawn_decode(write_png(dir.path(), "first.png", 1, 1));
        let refused = spawn_failed(
            "middle.png",
            std::io::Error::new(std::io::ErrorKind::WouldBlock, "Resource temporarily unavailable"),
        );
        let last = spawn_decode(write_png(dir.path(), "last.png", 1, 1));

        let names: Vec<String> = collect(vec![first, refused, last])
            .into_iter()
            .map(|d| d.image.name)
            .collect();
        assert_eq!(names, vec!["first.png", "last.png"]);
    }

    #[test]
    fn test_decode_images_empty_input() {
        assert!(decode_images(&[]).is_empty());
    }
}
