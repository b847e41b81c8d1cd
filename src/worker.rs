use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::convert::{AsciiConverter, CellGrid, PixelBuffer};
use crate::error::ConvertError;

pub const WORKER_THREAD_NAME: &str = "glyphcast-converter";

pub type ConvertResult = Result<CellGrid, ConvertError>;

/// Runs the converter on its own thread behind a pair of channels.
///
/// Nothing is shared with the display side: buffers move in, grids move
/// out.
pub struct ConverterWorker {
    sender: Option<mpsc::Sender<PixelBuffer>>,
    receiver: Option<mpsc::Receiver<ConvertResult>>,
    worker: Option<JoinHandle<Result<()>>>,
}

/// Everything that arrived since the last drain.
#[derive(Debug, Default)]
pub struct Drained {
    pub latest: Option<CellGrid>,
    pub received: usize,
    pub failures: Vec<ConvertError>,
}

impl ConverterWorker {
    pub fn spawn(converter: AsciiConverter) -> Result<Self> {
        let (frame_tx, frame_rx) = mpsc::channel::<PixelBuffer>();
        let (grid_tx, grid_rx) = mpsc::channel::<ConvertResult>();
        let cols = converter.cols();
        let rows = converter.rows();

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || {
                for buffer in frame_rx {
                    let result = converter.convert(&buffer);
                    if grid_tx.send(result).is_err() {
                        break;
                    }
                }
                tracing::debug!("converter worker exiting");
                Ok(())
            })
            .context("failed to spawn converter thread")?;

        tracing::info!(cols, rows, thread = WORKER_THREAD_NAME, "converter worker started");
        Ok(Self {
            sender: Some(frame_tx),
            receiver: Some(grid_rx),
            worker: Some(worker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Fire-and-forget hand-off of one frame.
    pub fn submit(&self, buffer: PixelBuffer) -> Result<(), ConvertError> {
        let sender = self.sender.as_ref().ok_or(ConvertError::WorkerUnavailable)?;
        sender
            .send(buffer)
            .map_err(|_| ConvertError::WorkerUnavailable)
    }

    /// Collects every result that has already arrived without blocking.
    /// Only the most recent grid is kept.
    pub fn drain(&self) -> Drained {
        let mut drained = Drained::default();
        let Some(receiver) = self.receiver.as_ref() else {
            return drained;
        };
        while let Ok(result) = receiver.try_recv() {
            drained.received += 1;
            match result {
                Ok(grid) => drained.latest = Some(grid),
                Err(error) => drained.failures.push(error),
            }
        }
        drained
    }

    /// Blocks for the next result. `Ok(None)` means the timeout elapsed.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ConvertResult>, ConvertError> {
        let receiver = self
            .receiver
            .as_ref()
            .ok_or(ConvertError::WorkerUnavailable)?;
        match receiver.recv_timeout(timeout) {
            Ok(result) => Ok(Some(result)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ConvertError::WorkerUnavailable),
        }
    }

    /// Drops both channel ends and detaches the thread. In-flight results
    /// are discarded; the thread exits once its current conversion ends.
    pub fn terminate(&mut self) {
        let was_running = self.sender.is_some();
        drop(self.sender.take());
        drop(self.receiver.take());
        drop(self.worker.take());
        if was_running {
            tracing::info!(thread = WORKER_THREAD_NAME, "converter worker terminated");
        }
    }
}

impl Drop for ConverterWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Counts display ticks without a fresh grid.
#[derive(Debug, Clone)]
pub struct StallMonitor {
    threshold: u32,
    ticks_since_grid: u32,
    stalled: bool,
}

impl StallMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            ticks_since_grid: 0,
            stalled: false,
        }
    }

    /// Returns true on the tick that enters the stalled state.
    pub fn on_tick(&mut self) -> bool {
        self.ticks_since_grid = self.ticks_since_grid.saturating_add(1);
        if !self.stalled && self.ticks_since_grid >= self.threshold {
            self.stalled = true;
            tracing::warn!(
                ticks = self.ticks_since_grid,
                "converter has not produced a grid recently"
            );
            return true;
        }
        false
    }

    pub fn on_grid(&mut self) {
        if self.stalled {
            tracing::info!(ticks = self.ticks_since_grid, "converter recovered");
        }
        self.ticks_since_grid = 0;
        self.stalled = false;
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    pub fn ticks_since_grid(&self) -> u32 {
        self.ticks_since_grid
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ConverterWorker, StallMonitor};
    use crate::config::GlyphcastConfig;
    use crate::convert::{AsciiConverter, PixelBuffer};
    use crate::error::ConvertError;

    fn worker(cols: u32, rows: u32) -> ConverterWorker {
        let mut config = GlyphcastConfig::default();
        config.grid.cols = cols;
        config.grid.rows = rows;
        let converter = AsciiConverter::from_config(&config).expect("converter should build");
        ConverterWorker::spawn(converter).expect("worker should spawn")
    }

    #[test]
    fn converts_submitted_frames_in_order() {
        let worker = worker(2, 1);
        worker
            .submit(PixelBuffer::new(2, 1, vec![255; 8]).expect("buffer should build"))
            .expect("submit should succeed");
        let result = worker
            .recv_timeout(Duration::from_secs(5))
            .expect("worker should be alive")
            .expect("result should arrive in time");
        let grid = result.expect("conversion should succeed");
        assert_eq!(grid.to_text(), "77\n");
    }

    #[test]
    fn mismatched_frames_come_back_as_errors() {
        let worker = worker(2, 2);
        worker
            .submit(PixelBuffer::transparent(3, 3).expect("buffer should build"))
            .expect("submit should succeed");
        let result = worker
            .recv_timeout(Duration::from_secs(5))
            .expect("worker should be alive")
            .expect("result should arrive in time");
        assert!(matches!(result, Err(ConvertError::GridMismatch { .. })));
    }

    #[test]
    fn terminated_worker_rejects_submissions() {
        let mut worker = worker(1, 1);
        worker.terminate();
        assert!(!worker.is_running());
        let error = worker
            .submit(PixelBuffer::transparent(1, 1).expect("buffer should build"))
            .expect_err("terminated worker should refuse");
        assert_eq!(error, ConvertError::WorkerUnavailable);
        assert_eq!(worker.drain().received, 0);
    }

    #[test]
    fn stall_is_reported_once_and_clears_on_grid() {
        let mut monitor = StallMonitor::new(3);
        assert!(!monitor.on_tick());
        assert!(!monitor.on_tick());
        assert!(monitor.on_tick());
        assert!(!monitor.on_tick());
        assert!(monitor.is_stalled());
        monitor.on_grid();
        assert!(!monitor.is_stalled());
        assert_eq!(monitor.ticks_since_grid(), 0);
    }
}
