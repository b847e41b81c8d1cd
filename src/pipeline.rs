use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::GlyphcastConfig;
use crate::convert::{AsciiConverter, CellGrid};
use crate::error::ConvertError;
use crate::producer::{FrameProducer, SceneState};
use crate::subscriptions::Subscriptions;
use crate::worker::{ConverterWorker, StallMonitor};

/// Skips ticks that arrive sooner than one frame interval after the last
/// processed tick.
#[derive(Debug, Clone)]
pub struct TickThrottle {
    interval: Duration,
    last_tick: Option<Instant>,
}

impl TickThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: None,
        }
    }

    pub fn from_fps(target_fps: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_tick {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_tick = Some(now);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped,
    Submitted,
    /// The worker is gone; the tick counts toward the stall.
    Stalled,
}

/// Producer, scene and converter worker wired together.
pub struct FramePipeline {
    producer: Box<dyn FrameProducer>,
    scene: SceneState,
    worker: ConverterWorker,
    throttle: TickThrottle,
    stall: StallMonitor,
    subscriptions: Subscriptions,
    cols: u32,
    rows: u32,
    submitted: u64,
    worker_lost: bool,
    torn_down: bool,
}

impl FramePipeline {
    pub fn new(config: &GlyphcastConfig, producer: Box<dyn FrameProducer>) -> Result<Self> {
        let converter = AsciiConverter::from_config(config).context("invalid ramp")?;
        let worker = ConverterWorker::spawn(converter)?;
        tracing::info!(
            producer = %producer.label(),
            cols = config.grid.cols,
            rows = config.grid.rows,
            fps = config.target_fps,
            "frame pipeline ready"
        );
        Ok(Self {
            producer,
            scene: SceneState::new(config.motion),
            worker,
            throttle: TickThrottle::from_fps(config.target_fps),
            stall: StallMonitor::new(config.display.stall_ticks),
            subscriptions: Subscriptions::new(),
            cols: config.grid.cols,
            rows: config.grid.rows,
            submitted: 0,
            worker_lost: false,
            torn_down: false,
        })
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneState {
        &mut self.scene
    }

    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    pub fn stall_monitor(&self) -> &StallMonitor {
        &self.stall
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Throttled tick: advance the scene, produce a frame, hand it off.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        if !self.throttle.ready(now) {
            return Ok(TickOutcome::Skipped);
        }
        match self.submit_frame() {
            Ok(()) => {
                self.stall.on_tick();
                Ok(TickOutcome::Submitted)
            }
            Err(error)
                if matches!(
                    error.downcast_ref::<ConvertError>(),
                    Some(ConvertError::WorkerUnavailable)
                ) =>
            {
                if !self.worker_lost {
                    self.worker_lost = true;
                    tracing::error!(
                        code = ConvertError::WorkerUnavailable.code(),
                        "converter worker lost"
                    );
                }
                self.stall.on_tick();
                Ok(TickOutcome::Stalled)
            }
            Err(error) => Err(error),
        }
    }

    /// Unthrottled produce and submit, for headless runs.
    pub fn submit_frame(&mut self) -> Result<()> {
        self.scene.advance();
        let buffer = self
            .producer
            .produce(&self.scene, self.cols, self.rows)
            .with_context(|| format!("{} failed to produce frame", self.producer.label()))?;
        self.worker.submit(buffer)?;
        self.submitted += 1;
        Ok(())
    }

    /// Latest grid that arrived since the last pump, if any.
    pub fn pump(&mut self) -> Option<CellGrid> {
        let drained = self.worker.drain();
        for failure in &drained.failures {
            tracing::error!(code = failure.code(), error = %failure, "conversion failed");
        }
        if drained.received > 1 {
            tracing::trace!(received = drained.received, "dropping superseded grids");
        }
        let latest = drained.latest?;
        self.stall.on_grid();
        Some(latest)
    }

    /// Blocks until the next conversion result arrives.
    pub fn wait_for_grid(&mut self, timeout: Duration) -> Result<CellGrid> {
        let result = self
            .worker
            .recv_timeout(timeout)?
            .ok_or_else(|| anyhow!("no grid arrived within {:?}", timeout))?;
        let grid = result?;
        self.stall.on_grid();
        Ok(grid)
    }

    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.worker.terminate();
        self.scene.dispose();
        self.subscriptions.dispose_all();
        tracing::info!(submitted = self.submitted, "pipeline torn down");
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::{FramePipeline, TickOutcome, TickThrottle};
    use crate::config::GlyphcastConfig;
    use crate::error::{find_error_code, ConvertError};
    use crate::producer::TorusProducer;

    fn config() -> GlyphcastConfig {
        let mut config = GlyphcastConfig::default();
        config.grid.cols = 24;
        config.grid.rows = 24;
        config
    }

    #[test]
    fn throttle_skips_early_ticks() {
        let start = Instant::now();
        let mut throttle = TickThrottle::from_fps(16);
        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(30)));
        assert!(throttle.ready(start + Duration::from_millis(63)));
        assert!(!throttle.ready(start + Duration::from_millis(100)));
        assert!(throttle.ready(start + Duration::from_millis(130)));
    }

    #[test]
    fn tick_submits_and_grid_comes_back() {
        let mut pipeline =
            FramePipeline::new(&config(), Box::new(TorusProducer::new())).expect("pipeline");
        let start = Instant::now();
        assert_eq!(pipeline.tick(start).expect("tick"), TickOutcome::Submitted);
        assert_eq!(
            pipeline.tick(start + Duration::from_millis(1)).expect("tick"),
            TickOutcome::Skipped
        );
        let grid = pipeline
            .wait_for_grid(Duration::from_secs(5))
            .expect("grid should arrive");
        assert_eq!((grid.cols(), grid.rows()), (24, 24));
        assert_eq!(pipeline.submitted(), 1);
        assert!(!pipeline.stall_monitor().is_stalled());
    }

    #[test]
    fn teardown_runs_subscriptions_and_stops_worker() {
        let mut pipeline =
            FramePipeline::new(&config(), Box::new(TorusProducer::new())).expect("pipeline");
        let disposed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disposed);
        pipeline
            .subscriptions_mut()
            .register("flag", move || flag.store(true, Ordering::SeqCst));

        pipeline.teardown();
        assert!(disposed.load(Ordering::SeqCst));
        assert!(pipeline.scene().is_disposed());

        let error = pipeline.submit_frame().expect_err("worker is gone");
        assert_eq!(find_error_code(&error), ConvertError::WorkerUnavailable.code());
    }

    #[test]
    fn lost_worker_surfaces_as_stall() {
        let mut config = config();
        config.display.stall_ticks = 2;
        let mut pipeline =
            FramePipeline::new(&config, Box::new(TorusProducer::new())).expect("pipeline");
        pipeline.teardown();

        let start = Instant::now();
        let mut outcomes = Vec::new();
        for tick in 0..3u64 {
            let outcome = pipeline
                .tick(start + Duration::from_millis(tick * 100))
                .expect("lost worker should not fail the tick");
            outcomes.push(outcome);
        }
        assert_eq!(outcomes, vec![TickOutcome::Stalled; 3]);
        assert!(pipeline.stall_monitor().is_stalled());
        assert_eq!(pipeline.stall_monitor().ticks_since_grid(), 3);
        assert!(pipeline.pump().is_none());
    }
}
