use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use glyphcast::canvas::Canvas;
use glyphcast::config::{load_config, parse_grid_size, GlyphcastConfig};
use glyphcast::convert::AsciiConverter;
use glyphcast::error::envelope;
use glyphcast::geometry::{Geometry, Viewport};
use glyphcast::painter::{ensure_glyphs_supported, painter_for};
use glyphcast::pipeline::FramePipeline;
use glyphcast::producer::{FrameProducer, ImageProducer, SceneState, SourceSpec};
use glyphcast::random::{UnitRandom, XorShift64};
use glyphcast::renderer::AsciiRenderer;
use glyphcast::terminal::{
    self, Action, InputEvent, ResizeGate, TerminalDisplay, TerminalSurface,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "glyphcast")]
#[command(version)]
#[command(about = "Frame-to-ASCII renderer with pointer trail highlights")]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate the configuration and print a summary
    Check,
    /// Convert one image to an ASCII-art PNG
    Convert {
        image: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Also write the glyph grid as plain text
        #[arg(long, value_name = "PATH")]
        text: Option<PathBuf>,
        /// Grid size as COLSxROWS
        #[arg(long)]
        size: Option<String>,
    },
    /// Run the threaded pipeline headless and write every frame as PNG
    Render {
        /// `torus` or `image:<path>`
        #[arg(long, default_value = "torus")]
        source: String,
        #[arg(long)]
        frames: u32,
        #[arg(long)]
        out_dir: PathBuf,
        /// Seed for the hover randomness
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        size: Option<String>,
        /// Drag a synthetic pointer diagonally across the grid
        #[arg(long)]
        sweep: bool,
    },
    /// Interactive terminal display
    Play {
        #[arg(long, default_value = "torus")]
        source: String,
        /// Grid size as COLSxROWS; defaults to the terminal size
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
        /// Directory for `s` exports
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = match cli.command {
        Commands::Play { .. } => "warn",
        _ => "info",
    };
    init_tracing(cli.log_level, default_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = option_env!("GLYPHCAST_GIT_HASH").unwrap_or("unknown"),
        "glyphcast starting"
    );

    let json = cli.json;
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if json {
                match serde_json::to_string(&envelope(&error)) {
                    Ok(body) => println!("{body}"),
                    Err(_) => eprintln!("error: {error:#}"),
                }
            } else {
                eprintln!("error: {error:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<LogLevel>, default_level: &str) {
    let level_filter = if let Some(level) = level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map(|filter| filter.to_string())
            .unwrap_or_else(|_| default_level.to_owned())
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => GlyphcastConfig::default(),
    };

    match cli.command {
        Commands::Check => run_check(config, cli.json),
        Commands::Convert {
            image,
            out_dir,
            text,
            size,
        } => run_convert(
            with_size(config, size.as_deref())?,
            &image,
            &out_dir,
            text.as_deref(),
            cli.json,
        ),
        Commands::Render {
            source,
            frames,
            out_dir,
            seed,
            size,
            sweep,
        } => run_render(
            with_size(config, size.as_deref())?,
            &SourceSpec::parse(&source)?,
            frames,
            &out_dir,
            seed,
            sweep,
            cli.json,
        ),
        Commands::Play {
            source,
            size,
            seed,
            out_dir,
        } => {
            let size = match size {
                Some(size) => Some(size),
                None => {
                    let (cols, rows) =
                        terminal::grid_area().context("failed to read terminal size")?;
                    Some(format!("{cols}x{rows}"))
                }
            };
            run_play(
                with_size(config, size.as_deref())?,
                &SourceSpec::parse(&source)?,
                seed,
                &out_dir,
            )
        }
    }
}

fn with_size(mut config: GlyphcastConfig, size: Option<&str>) -> Result<GlyphcastConfig> {
    if let Some(raw) = size {
        let (cols, rows) = parse_grid_size(raw)?;
        config.grid.cols = cols;
        config.grid.rows = rows;
    }
    config.validate()?;
    Ok(config)
}

fn make_rng(seed: Option<u64>) -> Box<dyn UnitRandom + Send> {
    match seed {
        Some(seed) => Box::new(XorShift64::from_seed(seed)),
        None => Box::new(XorShift64::from_clock()),
    }
}

fn export_canvas(config: &GlyphcastConfig) -> Result<Canvas> {
    let painter = painter_for(config.display.font.as_ref())?;
    ensure_glyphs_supported(painter.as_ref(), &config.drawable_glyphs())?;
    let viewport = Viewport {
        width: config.display.viewport_height,
        height: config.display.viewport_height,
        device_pixel_ratio: config.display.device_pixel_ratio,
    };
    let geometry = Geometry::compute(
        viewport,
        config.grid.cols,
        config.grid.rows,
        config.display.spacing,
    );
    Canvas::new(geometry, painter, config.export.filename.clone())
}

fn run_check(config: GlyphcastConfig, json: bool) -> Result<()> {
    let painter = painter_for(config.display.font.as_ref())?;
    ensure_glyphs_supported(painter.as_ref(), &config.drawable_glyphs())?;
    let ramp = config
        .ramp
        .iter()
        .map(|entry| format!("{}:{}", entry.threshold, entry.glyph))
        .collect::<Vec<_>>();

    if json {
        let body = json!({
            "ok": true,
            "grid": { "cols": config.grid.cols, "rows": config.grid.rows },
            "target_fps": config.target_fps,
            "ramp": ramp,
            "hover_glyph": config.hover.glyph.to_string(),
            "painter": painter.label(),
            "export_filename": config.export.filename,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "OK: grid {}x{}, {} fps, painter: {}",
        config.grid.cols,
        config.grid.rows,
        config.target_fps,
        painter.label()
    );
    println!("Ramp: {}", ramp.join(" "));
    Ok(())
}

fn run_convert(
    config: GlyphcastConfig,
    image: &Path,
    out_dir: &Path,
    text: Option<&Path>,
    json: bool,
) -> Result<()> {
    let converter = AsciiConverter::from_config(&config)?;
    let mut producer = ImageProducer::open(image)?;
    let scene = SceneState::new(config.motion);
    let buffer = producer.produce(&scene, config.grid.cols, config.grid.rows)?;
    let grid = converter
        .convert(&buffer)
        .with_context(|| format!("failed to convert {}", image.display()))?;

    let mut canvas = export_canvas(&config)?;
    let geometry = *canvas.geometry();
    let mut renderer = AsciiRenderer::new(&config, geometry, make_rng(None));
    let stats = renderer.render(&grid, &mut canvas, Instant::now());
    let output = canvas.export_png(out_dir)?;

    if let Some(text_path) = text {
        fs::write(text_path, grid.to_text())
            .with_context(|| format!("failed to write {}", text_path.display()))?;
    }

    if json {
        let body = json!({
            "ok": true,
            "output": output.display().to_string(),
            "text": text.map(|path| path.display().to_string()),
            "cols": grid.cols(),
            "rows": grid.rows(),
            "glyphs_drawn": stats.drawn,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Wrote {}", output.display());
    }
    Ok(())
}

fn run_render(
    config: GlyphcastConfig,
    source: &SourceSpec,
    frames: u32,
    out_dir: &Path,
    seed: Option<u64>,
    sweep: bool,
    json: bool,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut pipeline = FramePipeline::new(&config, source.build()?)?;
    let mut canvas = export_canvas(&config)?;
    let geometry = *canvas.geometry();
    let mut renderer = AsciiRenderer::new(&config, geometry, make_rng(seed));

    // Frame timestamps advance on a fixed clock so seeded runs repeat.
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(config.target_fps));
    let start = Instant::now();
    let mut highlighted = 0;

    for frame in 0..frames {
        pipeline.submit_frame()?;
        let grid = pipeline
            .wait_for_grid(Duration::from_secs(10))
            .with_context(|| format!("frame {frame}"))?;
        let now = start + frame_interval * frame;

        if sweep {
            let progress = (frame as f32 + 0.5) / frames.max(1) as f32;
            let cell_x = (progress * config.grid.cols as f32).floor() as u32;
            let cell_y = (progress * config.grid.rows as f32).floor() as u32;
            let (px, py) = geometry.cell_origin(cell_x, cell_y);
            renderer.pointer_moved(px + 0.5, py + 0.5, now);
        }

        let stats = renderer.present(grid, &mut canvas, now);
        highlighted += stats.highlighted;
        canvas.write_png(&out_dir.join(format!("frame_{frame:04}.png")))?;
        if frame % config.target_fps == 0 {
            tracing::info!(frame = frame + 1, total = frames, "rendered frame");
        }
    }

    let export = canvas.export_png(out_dir)?;
    pipeline.teardown();

    if json {
        let body = json!({
            "ok": true,
            "frames": frames,
            "out_dir": out_dir.display().to_string(),
            "export": export.display().to_string(),
            "highlighted": highlighted,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Wrote {} frames to {}", frames, out_dir.display());
    }
    Ok(())
}

fn run_play(
    config: GlyphcastConfig,
    source: &SourceSpec,
    seed: Option<u64>,
    out_dir: &Path,
) -> Result<()> {
    let cols = config.grid.cols;
    let rows = config.grid.rows;
    let producer = source.build()?;
    let label = producer.label();

    let mut pipeline = FramePipeline::new(&config, producer)?;
    terminal::enter_interactive_mode(pipeline.subscriptions_mut())
        .context("failed to prepare terminal")?;

    let mut renderer = AsciiRenderer::new(&config, Geometry::unit(cols, rows), make_rng(seed));
    let mut surface = TerminalSurface::new(
        u16::try_from(cols).context("grid too wide for terminal")?,
        u16::try_from(rows).context("grid too tall for terminal")?,
    );
    let mut display = TerminalDisplay::new();
    let (mut term_width, mut term_height) = crossterm::terminal::size().unwrap_or((1, 1));
    let mut resize = ResizeGate::new(config.display.resize_throttle());
    let mut paused = false;
    let mut notice = String::new();

    let result = (|| -> Result<()> {
        loop {
            let mut redraw = false;
            while let Some(event) = terminal::poll_input(Duration::from_millis(4))? {
                let now = Instant::now();
                match event {
                    InputEvent::Key(Action::Quit) => return Ok(()),
                    InputEvent::Key(Action::Pause) => {
                        paused = !paused;
                        redraw = true;
                    }
                    InputEvent::Key(Action::Export) => {
                        notice = match export_snapshot(&config, &surface, out_dir) {
                            Ok(path) => format!("exported {}", path.display()),
                            Err(error) => {
                                tracing::error!(error = %format!("{error:#}"), "export failed");
                                format!("export failed: {error}")
                            }
                        };
                        redraw = true;
                    }
                    InputEvent::Key(Action::None) => {}
                    InputEvent::PointerMoved { column, row } => {
                        if u32::from(column) < cols && u32::from(row) < rows {
                            renderer.pointer_moved(
                                f32::from(column) + 0.5,
                                f32::from(row) + 0.5,
                                now,
                            );
                        } else {
                            renderer.pointer_left();
                        }
                        pipeline.scene_mut().on_pointer(
                            f32::from(column) / f32::from(term_width.max(1)),
                            f32::from(row) / f32::from(term_height.max(1)),
                        );
                        redraw = paused;
                    }
                    InputEvent::PointerLeft => renderer.pointer_left(),
                    InputEvent::Resized { width, height } => resize.record(width, height),
                }
            }

            let now = Instant::now();
            if let Some((width, height)) = resize.take_due(now) {
                term_width = width;
                term_height = height;
                display.clear()?;
                redraw = true;
            }
            renderer.poll_pointer(now);
            if !paused {
                pipeline.tick(now)?;
            }

            let stalled = pipeline.stall_monitor().is_stalled();
            let status = |paused: bool, notice: &str| {
                format!(
                    "glyphcast | {label} | {cols}x{rows}{}{} | s export  space pause  q quit {notice}",
                    if paused { " | paused" } else { "" },
                    if stalled { " | stalled" } else { "" }
                )
            };
            if let Some(grid) = pipeline.pump() {
                renderer.present(grid, &mut surface, now);
                display.present(&surface, &status(paused, &notice))?;
            } else if redraw && renderer.redraw(&mut surface, now).is_some() {
                display.present(&surface, &status(paused, &notice))?;
            }
        }
    })();

    pipeline.teardown();
    result
}

fn export_snapshot(config: &GlyphcastConfig, surface: &TerminalSurface, out_dir: &Path) -> Result<PathBuf> {
    let mut canvas = export_canvas(config)?;
    let geometry = *canvas.geometry();
    surface.replay(&mut canvas, &geometry);
    Ok(canvas.export_png(out_dir)?)
}
