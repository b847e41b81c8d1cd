use std::time::{Duration, Instant};

use anyhow::Result;
use glyphcast::config::GlyphcastConfig;
use glyphcast::convert::{AsciiConverter, PixelBuffer};
use glyphcast::pipeline::{FramePipeline, TickOutcome};
use glyphcast::producer::{FrameProducer, SceneState, TorusProducer};
use glyphcast::worker::{ConverterWorker, Drained};

fn config(cols: u32, rows: u32) -> GlyphcastConfig {
    let mut config = GlyphcastConfig::default();
    config.grid.cols = cols;
    config.grid.rows = rows;
    config
}

fn flat(cols: u32, rows: u32, level: u8) -> PixelBuffer {
    let pixels = (0..cols * rows)
        .flat_map(|_| [level, level, level, 255])
        .collect();
    PixelBuffer::new(cols, rows, pixels).expect("buffer should build")
}

fn drain_until(worker: &ConverterWorker, expected: usize) -> Drained {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut total = Drained::default();
    while total.received < expected && Instant::now() < deadline {
        let drained = worker.drain();
        total.received += drained.received;
        total.failures.extend(drained.failures);
        if drained.latest.is_some() {
            total.latest = drained.latest;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    total
}

#[test]
fn last_received_grid_wins() {
    let converter = AsciiConverter::from_config(&config(4, 2)).expect("converter should build");
    let worker = ConverterWorker::spawn(converter).expect("worker should spawn");
    for level in [0, 128, 255] {
        worker.submit(flat(4, 2, level)).expect("submit should succeed");
    }

    let drained = drain_until(&worker, 3);
    assert_eq!(drained.received, 3);
    assert!(drained.failures.is_empty());
    let latest = drained.latest.expect("a grid should arrive");
    assert_eq!(latest.to_text(), "7777\n7777\n");
}

#[test]
fn failed_conversions_are_reported_not_fatal() {
    let converter = AsciiConverter::from_config(&config(4, 2)).expect("converter should build");
    let worker = ConverterWorker::spawn(converter).expect("worker should spawn");
    worker
        .submit(PixelBuffer::transparent(2, 2).expect("buffer should build"))
        .expect("submit should succeed");
    worker.submit(flat(4, 2, 255)).expect("submit should succeed");

    let drained = drain_until(&worker, 2);
    assert_eq!(drained.failures.len(), 1);
    assert_eq!(drained.failures[0].code(), "GRID_MISMATCH");
    assert!(drained.latest.is_some());
}

struct WrongSizeProducer;

impl FrameProducer for WrongSizeProducer {
    fn label(&self) -> String {
        "wrong size".to_owned()
    }

    fn produce(&mut self, _scene: &SceneState, cols: u32, rows: u32) -> Result<PixelBuffer> {
        Ok(PixelBuffer::transparent(cols + 1, rows)?)
    }
}

#[test]
fn silent_converter_is_reported_as_stall() {
    let mut config = config(6, 6);
    config.display.stall_ticks = 3;
    let mut pipeline =
        FramePipeline::new(&config, Box::new(WrongSizeProducer)).expect("pipeline should build");

    let start = Instant::now();
    for tick in 0..3u64 {
        let outcome = pipeline
            .tick(start + Duration::from_millis(tick * 100))
            .expect("tick should succeed");
        assert_eq!(outcome, TickOutcome::Submitted);
        assert!(pipeline.pump().is_none());
    }
    assert!(pipeline.stall_monitor().is_stalled());
    pipeline.teardown();
}

#[test]
fn teardown_is_idempotent_and_discards_in_flight_work() {
    let mut pipeline = FramePipeline::new(&config(32, 32), Box::new(TorusProducer::new()))
        .expect("pipeline should build");
    for _ in 0..4 {
        pipeline.submit_frame().expect("submit should succeed");
    }
    pipeline.teardown();
    pipeline.teardown();
    assert!(pipeline.pump().is_none());
    assert!(pipeline.scene().is_disposed());
}
