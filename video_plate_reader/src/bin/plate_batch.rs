//! plate_batch - read the license plate of every video in a folder

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use pyroscope::PyroscopeAgent;
use pyroscope_pprofrs::pprof_backend;
use pyroscope_pprofrs::PprofConfig;

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use video_plate_reader::logging;
use video_plate_reader::metrics;
use video_plate_reader::report;
use video_plate_reader::ReaderConfig;
use video_plate_reader::VideoPlateProcessor;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Folder holding the .mp4 files to read.
    #[arg(long, default_value = "uploads")]
    uploads: PathBuf,
    /// Report file, rewritten on every run.
    #[arg(long, default_value = "output.txt")]
    output: PathBuf,
    /// TOML configuration file.
    #[arg(long, env = "PLATE_READER_CONFIG")]
    config: Option<PathBuf>,
    /// Worker threads per video (overrides the configuration file).
    #[arg(long)]
    workers: Option<usize>,
    /// Sample every Nth frame (overrides the configuration file).
    #[arg(long)]
    frame_skip: Option<u64>,
    /// Give up on outstanding frames after this many milliseconds without progress.
    #[arg(long)]
    task_timeout_ms: Option<u64>,
    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Print Prometheus metrics to stdout when done.
    #[arg(long)]
    metrics: bool,
    /// Push CPU profiles to this Pyroscope server.
    #[arg(long, value_name = "URL")]
    pyroscope: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;

    let mut config = ReaderConfig::load(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.pool.workers = workers;
    }
    if let Some(frame_skip) = args.frame_skip {
        config.pool.frame_skip = frame_skip;
    }
    if let Some(ms) = args.task_timeout_ms {
        config.pool.task_timeout = Some(Duration::from_millis(ms));
    }
    config.validate()?;

    let agent = match &args.pyroscope {
        Some(url) => {
            let agent = PyroscopeAgent::builder(url.as_str(), "video_plate_reader")
                .backend(pprof_backend(PprofConfig::new().sample_rate(100)))
                .build()?;
            Some(agent.start()?)
        }
        None => None,
    };

    let started = Instant::now();
    let videos = report::list_videos(&args.uploads)
        .with_context(|| format!("listing {}", args.uploads.display()))?;
    log::info!(
        "found {} videos in {}",
        videos.len(),
        args.uploads.display()
    );

    let processor = VideoPlateProcessor::with_tesseract(&config);
    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    for video in &videos {
        match processor.process_path(video) {
            Ok(plate) => report::write_entry(&mut out, &plate.video, &plate.result)?,
            Err(err) => log::error!("skipping {}: {}", video.display(), err),
        }
    }
    out.flush()?;

    println!(
        "License plate recognition complete. Results written to {}.",
        args.output.display()
    );
    println!("Elapsed time: {:.2} seconds.", started.elapsed().as_secs_f64());

    if args.metrics {
        print!("{}", metrics::render()?);
    }

    if let Some(running) = agent {
        let ready = running.stop()?;
        ready.shutdown();
    }
    Ok(())
}
