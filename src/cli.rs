// Command line interface module
// Handles parsing and validation of command line arguments

use clap::Parser;
use std::path::PathBuf;

/// Default initial window edge in pixels
pub const DEFAULT_WINDOW_SIZE: u32 = 600;

/// Default keyboard pan step in pixels
pub const DEFAULT_INCREMENT: i32 = 20;

/// iview - page through a set of images and pan them
#[derive(Parser, Debug)]
#[command(name = "iview")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image files or directories of images
    #[arg(value_name = "IMAGE_FILE_OR_DIR", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// If set, logging output will be printed to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// The initial width of the window
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// The initial height of the window
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// If set, the window will resize to the size of the first image
    #[arg(long)]
    pub auto_resize: bool,

    /// The increment (in pixels) used to pan the image with h, j, k, l
    #[arg(long, default_value_t = DEFAULT_INCREMENT, allow_negative_numbers = true)]
    pub increment: i32,

    /// If set, a timing profile will be saved to the file name provided
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,
}

/// Parsed arguments handed to the rest of the program
#[derive(Debug, Clone)]
pub struct ParsedArgs {
    pub paths: Vec<PathBuf>,
    pub verbose: bool,
    pub width: u32,
    pub height: u32,
    pub auto_resize: bool,
    pub increment: i32,
    pub profile: Option<PathBuf>,
}

impl From<Args> for ParsedArgs {
    fn from(args: Args) -> Self {
        Self {
            paths: args.paths,
            verbose: args.verbose,
            width: args.width,
            height: args.height,
            auto_resize: args.auto_resize,
            increment: args.increment,
            profile: args.profile,
        }
    }
}

/// Parse command line arguments.
///
/// Missing paths and zero window dimensions are rejected by clap, which prints
/// usage and exits with a non-zero status.
pub fn parse_args() -> ParsedArgs {
    Args::parse().into()
}
