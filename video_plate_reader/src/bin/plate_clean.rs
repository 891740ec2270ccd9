//! plate_clean - empty the uploads folder and drop the log file

use anyhow::Result;
use clap::Parser;

use std::path::PathBuf;

use video_plate_reader::logging;
use video_plate_reader::report;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "uploads")]
    uploads: PathBuf,
    #[arg(long, default_value = "server.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(None)?;
    report::clean(&args.uploads, &args.log_file)?;
    Ok(())
}
