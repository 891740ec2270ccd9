//! plate_cut - copy a time window of a video into a new file

use anyhow::Result;
use clap::Parser;

use std::path::PathBuf;

use video_plate_reader::logging;
use video_plate_reader::plate_detection::clip_writer::trim_clip;
use video_plate_reader::plate_detection::clip_writer::ClipWindow;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "uploads/001.mp4")]
    input: PathBuf,
    #[arg(long, default_value = "uploads/cut_001.mp4")]
    output: PathBuf,
    /// Start of the window in seconds (inclusive).
    #[arg(long, default_value_t = 2.0)]
    start: f64,
    /// End of the window in seconds (exclusive).
    #[arg(long, default_value_t = 4.0)]
    end: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(None)?;

    let window = ClipWindow::new(args.start, args.end)?;
    let summary = trim_clip(&args.input, &args.output, window)?;
    log::debug!("{} frames written", summary.frames_written);
    println!("Cut video saved as {}", args.output.display());
    Ok(())
}
