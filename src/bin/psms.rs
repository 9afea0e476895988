//! psms - parking space occupancy monitor
//!
//! Loads the zone file, opens the video source and detector, then runs the
//! frame loop until the stream ends, the frame limit is reached or Ctrl-C is
//! pressed. Annotated frames are written to `--output-dir` when given.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use psms::render::{OverlayOptions, Renderer};
use psms::sink::{FrameSink, HeadlessSink, ImageDirSink, QuitSignal};
use psms::{
    open_backend, open_source, zones, BackendKind, FrameLoop, LoopSettings, MonitorConfig,
    UnmatchedLinePolicy,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "psms",
    version,
    about = "Count occupied parking spaces in a video stream"
)]
struct Args {
    /// Run configuration file (JSON, or TOML by extension)
    #[arg(long, env = "PSMS_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Zone file with polygons, number_of_zone and frame size
    #[arg(long, value_name = "PATH")]
    zones: Option<PathBuf>,

    /// Video source: file, image directory, camera index or stub://name
    #[arg(long, value_name = "SOURCE")]
    source: Option<String>,

    /// Detector backend
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// ONNX model for the tract backend
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Detection script for the replay backend
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Class names file, one per line
    #[arg(long, value_name = "PATH")]
    class_names: Option<PathBuf>,

    /// Minimum detection confidence (exclusive)
    #[arg(long)]
    confidence: Option<f32>,

    /// Write annotated frames to this directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Save only every N-th annotated frame
    #[arg(long, value_name = "N")]
    save_every: Option<u32>,

    /// TrueType font for labels and counters (default: bundled DejaVu Sans)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Also draw one occupancy line per zone
    #[arg(long)]
    zone_info: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Handling of unrecognised zone file lines
    #[arg(long, value_enum)]
    unmatched_lines: Option<UnmatchedLinePolicy>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug, psms=trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

impl Args {
    fn apply(&self, cfg: &mut MonitorConfig) {
        if let Some(path) = &self.zones {
            cfg.zones_path = path.clone();
        }
        if let Some(source) = &self.source {
            cfg.source = source.clone();
        }
        if let Some(backend) = self.backend {
            cfg.detector.backend = backend;
        }
        if let Some(model) = &self.model {
            cfg.detector.model_path = Some(model.clone());
        }
        if let Some(replay) = &self.replay {
            cfg.detector.replay_path = Some(replay.clone());
        }
        if let Some(names) = &self.class_names {
            cfg.detector.class_names_path = Some(names.clone());
        }
        if let Some(confidence) = self.confidence {
            cfg.detector.confidence = confidence;
        }
        if let Some(dir) = &self.output_dir {
            cfg.output.dir = Some(dir.clone());
        }
        if let Some(every) = self.save_every {
            cfg.output.every_n = every;
        }
        if let Some(font) = &self.font {
            cfg.output.font_path = Some(font.clone());
        }
        if self.zone_info {
            cfg.output.draw_zone_info = true;
        }
        if let Some(max) = self.max_frames {
            cfg.max_frames = Some(max);
        }
        if let Some(policy) = self.unmatched_lines {
            cfg.unmatched_lines = policy;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::new(args.ui, is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = match &args.config {
            Some(path) => MonitorConfig::load_from_unvalidated(path)?,
            None => MonitorConfig::load_unvalidated()?,
        };
        args.apply(&mut cfg);
        cfg.validate()?;
        cfg
    };

    let zone_config = {
        let _stage = ui.stage("Load zones");
        zones::load(&cfg.zones_path, cfg.unmatched_lines)?
    };

    let mut detector = {
        let _stage = ui.stage("Open detector");
        open_backend(&cfg.detector)?
    };

    let mut source = {
        let _stage = ui.stage("Open video source");
        open_source(&cfg.source)?
    };

    let renderer = {
        let options = OverlayOptions {
            draw_zones: cfg.output.draw_zones,
            draw_zone_info: cfg.output.draw_zone_info,
        };
        let renderer = Renderer::new(options);
        match &cfg.output.font_path {
            Some(path) => {
                log::info!("drawing text with {}", path.display());
                renderer.with_font_path(path)?
            }
            None => renderer,
        }
    };

    let output: Box<dyn FrameSink> = match &cfg.output.dir {
        Some(dir) => {
            log::info!("writing annotated frames to {}", dir.display());
            Box::new(ImageDirSink::new(dir, cfg.output.every_n)?)
        }
        None => Box::new(HeadlessSink),
    };
    let mut sink = ui.progress_sink(output);

    let quit = QuitSignal::install_ctrlc()?;
    let frame_loop =
        FrameLoop::new(&zone_config, &renderer, LoopSettings::from(&cfg)).with_quit_signal(quit);
    let run = frame_loop.run(source.as_mut(), detector.as_mut(), &mut sink);
    sink.finish();
    let run = run?;

    println!("frames processed: {}", run.frames);
    println!("stopped: {}", run.stop);
    if let Some(last) = run.last {
        println!("vacant: {}", last.vacant);
        println!("occupied: {}", last.occupied);
    }
    println!("peak occupied: {}", run.peak_occupied);
    Ok(())
}
