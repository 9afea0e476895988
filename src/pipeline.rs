//! The per-frame monitoring loop.
//!
//! Each iteration reads one frame, scales it into the zone coordinate space,
//! runs the detector, classifies detections against the zones, draws the
//! overlay and hands the result to a sink. Occupancy lists live for exactly
//! one iteration.

use std::fmt;

use anyhow::{Context, Result};

use crate::config::MonitorConfig;
use crate::detect::DetectorBackend;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::occupancy::{classify, Classification, OccupancySummary};
use crate::render::Renderer;
use crate::sink::{FrameSink, LoopControl, QuitSignal};
use crate::zones::ZoneConfig;

/// Loop limits and thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopSettings {
    pub confidence: f32,
    pub max_frames: Option<u64>,
    /// Log the occupancy summary every this many frames.
    pub log_every: u64,
}

impl From<&MonitorConfig> for LoopSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            confidence: cfg.detector.confidence,
            max_frames: cfg.max_frames,
            log_every: cfg.log_every,
        }
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    MaxFrames,
    QuitRequested,
    SinkStopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EndOfStream => "end of stream",
            StopReason::MaxFrames => "frame limit reached",
            StopReason::QuitRequested => "quit requested",
            StopReason::SinkStopped => "output stopped",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub last: Option<OccupancySummary>,
    pub peak_occupied: usize,
    pub stop: StopReason,
}

/// One frame after detection, classification and drawing.
pub struct ProcessedFrame {
    pub frame: Frame,
    pub classification: Classification,
    pub summary: OccupancySummary,
}

pub struct FrameLoop<'a> {
    zones: &'a ZoneConfig,
    renderer: &'a Renderer,
    settings: LoopSettings,
    quit: QuitSignal,
}

impl<'a> FrameLoop<'a> {
    pub fn new(zones: &'a ZoneConfig, renderer: &'a Renderer, settings: LoopSettings) -> Self {
        Self {
            zones,
            renderer,
            settings,
            quit: QuitSignal::new(),
        }
    }

    pub fn with_quit_signal(mut self, quit: QuitSignal) -> Self {
        self.quit = quit;
        self
    }

    /// Resize, detect, classify and draw a single frame.
    pub fn process(
        &self,
        mut frame: Frame,
        detector: &mut dyn DetectorBackend,
    ) -> Result<ProcessedFrame> {
        let index = frame.index;
        frame.resize_to(self.zones.frame_size())?;
        let detections = detector
            .detect(&frame, self.settings.confidence)
            .with_context(|| format!("detection failed on frame {}", index))?;
        let classification = classify(
            &detections,
            &self.zones.zones,
            self.zones.zone_count,
            detector.class_names(),
        );
        let summary =
            OccupancySummary::from_occupancy(self.zones.zone_count, &classification.occupancy);
        self.renderer
            .render(&mut frame, &self.zones.zones, &classification, &summary);
        Ok(ProcessedFrame {
            frame,
            classification,
            summary,
        })
    }

    /// Run until end-of-stream, the frame limit, a quit request or the sink
    /// asks to stop.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        detector: &mut dyn DetectorBackend,
        sink: &mut dyn FrameSink,
    ) -> Result<RunSummary> {
        let mut frames = 0u64;
        let mut last = None;
        let mut peak_occupied = 0usize;

        let stop = loop {
            if self.quit.is_requested() {
                break StopReason::QuitRequested;
            }
            if self.settings.max_frames.is_some_and(|max| frames >= max) {
                break StopReason::MaxFrames;
            }
            let Some(frame) = source
                .next_frame()
                .with_context(|| format!("failed to read from {}", source.describe()))?
            else {
                break StopReason::EndOfStream;
            };

            let processed = self.process(frame, detector)?;
            let summary = processed.summary;
            frames += 1;
            peak_occupied = peak_occupied.max(summary.occupied);
            last = Some(summary);

            if (frames - 1) % self.settings.log_every.max(1) == 0 {
                log::info!(
                    "frame {}: {} object(s), occupied {}/{}, vacant {}",
                    processed.frame.index,
                    processed.classification.annotated.len(),
                    summary.occupied,
                    summary.total,
                    summary.vacant
                );
            }

            if sink.present(&processed.frame, &summary)? == LoopControl::Stop {
                break StopReason::SinkStopped;
            }
        };

        log::info!("monitor stopped after {} frame(s): {}", frames, stop);
        Ok(RunSummary {
            frames,
            last,
            peak_occupied,
            stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ClassNames, Detection, ReplayBackend};
    use crate::frame::FrameSize;
    use crate::ingest::SyntheticSource;
    use crate::render::OverlayOptions;
    use crate::zones::{Zone, ZoneSet};

    fn lot() -> ZoneConfig {
        let zones = ZoneSet::from_zones(
            FrameSize::new(200, 100),
            vec![
                Zone::new(0, vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]).unwrap(),
                Zone::new(1, vec![(100.0, 0.0), (200.0, 0.0), (200.0, 100.0), (100.0, 100.0)])
                    .unwrap(),
            ],
        );
        ZoneConfig {
            zones,
            zone_count: 2,
        }
    }

    fn settings(max_frames: Option<u64>) -> LoopSettings {
        LoopSettings {
            confidence: 0.15,
            max_frames,
            log_every: 1,
        }
    }

    struct Collect {
        summaries: Vec<(u64, OccupancySummary, FrameSize)>,
        stop_after: Option<usize>,
    }

    impl FrameSink for Collect {
        fn present(&mut self, frame: &Frame, summary: &OccupancySummary) -> Result<LoopControl> {
            self.summaries.push((frame.index, *summary, frame.size()));
            if self.stop_after == Some(self.summaries.len()) {
                return Ok(LoopControl::Stop);
            }
            Ok(LoopControl::Continue)
        }
    }

    #[test]
    fn runs_to_end_of_stream_and_tracks_peak() -> Result<()> {
        let zones = lot();
        let renderer = Renderer::new(OverlayOptions::default());
        let car = Detection::new(40.0, 40.0, 60.0, 60.0, 0.9, 2);
        let truck = Detection::new(140.0, 40.0, 160.0, 60.0, 0.8, 7);
        let mut detector = ReplayBackend::new(
            vec![vec![car], vec![car, truck], vec![]],
            ClassNames::coco(),
        );
        let mut source = SyntheticSource::from_spec("stub://lot?frames=3&size=400x200")?;
        let mut sink = Collect {
            summaries: Vec::new(),
            stop_after: None,
        };

        let run = FrameLoop::new(&zones, &renderer, settings(None)).run(
            &mut source,
            &mut detector,
            &mut sink,
        )?;

        assert_eq!(run.frames, 3);
        assert_eq!(run.stop, StopReason::EndOfStream);
        assert_eq!(run.peak_occupied, 2);
        assert_eq!(
            run.last,
            Some(OccupancySummary {
                total: 2,
                occupied: 0,
                vacant: 2
            })
        );
        let occupied: Vec<usize> = sink.summaries.iter().map(|(_, s, _)| s.occupied).collect();
        assert_eq!(occupied, vec![1, 2, 0]);
        assert!(sink
            .summaries
            .iter()
            .all(|(_, _, size)| *size == FrameSize::new(200, 100)));
        Ok(())
    }

    #[test]
    fn honours_frame_limit() -> Result<()> {
        let zones = lot();
        let renderer = Renderer::new(OverlayOptions::default());
        let mut detector = ReplayBackend::empty(ClassNames::coco());
        let mut source = SyntheticSource::from_spec("stub://lot")?;
        let mut sink = Collect {
            summaries: Vec::new(),
            stop_after: None,
        };

        let run = FrameLoop::new(&zones, &renderer, settings(Some(4))).run(
            &mut source,
            &mut detector,
            &mut sink,
        )?;
        assert_eq!(run.frames, 4);
        assert_eq!(run.stop, StopReason::MaxFrames);
        Ok(())
    }

    #[test]
    fn quit_signal_stops_before_next_frame() -> Result<()> {
        let zones = lot();
        let renderer = Renderer::new(OverlayOptions::default());
        let mut detector = ReplayBackend::empty(ClassNames::coco());
        let mut source = SyntheticSource::from_spec("stub://lot")?;
        let mut sink = Collect {
            summaries: Vec::new(),
            stop_after: None,
        };
        let quit = QuitSignal::new();
        quit.request();

        let run = FrameLoop::new(&zones, &renderer, settings(None))
            .with_quit_signal(quit)
            .run(&mut source, &mut detector, &mut sink)?;
        assert_eq!(run.frames, 0);
        assert_eq!(run.last, None);
        assert_eq!(run.stop, StopReason::QuitRequested);
        Ok(())
    }

    #[test]
    fn sink_can_stop_the_run() -> Result<()> {
        let zones = lot();
        let renderer = Renderer::new(OverlayOptions::default());
        let mut detector = ReplayBackend::empty(ClassNames::coco());
        let mut source = SyntheticSource::from_spec("stub://lot")?;
        let mut sink = Collect {
            summaries: Vec::new(),
            stop_after: Some(2),
        };

        let run = FrameLoop::new(&zones, &renderer, settings(None)).run(
            &mut source,
            &mut detector,
            &mut sink,
        )?;
        assert_eq!(run.frames, 2);
        assert_eq!(run.stop, StopReason::SinkStopped);
        Ok(())
    }

    #[test]
    fn process_reports_annotations() -> Result<()> {
        let zones = lot();
        let renderer = Renderer::new(OverlayOptions::default());
        let outside_all = Detection::new(-50.0, -50.0, -40.0, -40.0, 0.9, 2);
        let inside = Detection::new(140.0, 40.0, 160.0, 60.0, 0.9, 2);
        let mut detector =
            ReplayBackend::new(vec![vec![outside_all, inside]], ClassNames::coco());
        let frame = Frame::new(0, image::RgbImage::new(200, 100));

        let processed = FrameLoop::new(&zones, &renderer, settings(None))
            .process(frame, &mut detector)?;
        assert_eq!(processed.classification.annotated.len(), 1);
        assert_eq!(processed.classification.annotated[0].zone, Some(1));
        assert_eq!(processed.classification.occupancy.occupants(1), &["car".to_string()]);
        assert_eq!(processed.summary.vacant, 1);
        Ok(())
    }
}
