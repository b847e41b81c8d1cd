//! Terminal display and input handling

use std::io::{self, BufWriter, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind,
};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use crate::convert::Rgb;
use crate::geometry::{Geometry, ResizeThrottle};
use crate::renderer::GlyphSurface;
use crate::subscriptions::Subscriptions;

/// Rows reserved below the grid for the status line.
pub const STATUS_ROWS: u16 = 1;

/// Switches the terminal into raw, alternate-screen, mouse-reporting mode.
/// Every mode is registered with `subscriptions` so teardown restores it.
pub fn enter_interactive_mode(subscriptions: &mut Subscriptions) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    subscriptions.register("raw-mode", || {
        let _ = terminal::disable_raw_mode();
    });

    execute!(io::stdout(), EnterAlternateScreen, Clear(ClearType::All))?;
    subscriptions.register("alternate-screen", || {
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    });

    execute!(io::stdout(), Hide, DisableLineWrap)?;
    subscriptions.register("cursor", || {
        let _ = execute!(io::stdout(), ResetColor, Show, EnableLineWrap);
    });

    execute!(io::stdout(), EnableMouseCapture)?;
    subscriptions.register("mouse-capture", || {
        let _ = execute!(io::stdout(), DisableMouseCapture);
    });

    execute!(io::stdout(), EnableFocusChange)?;
    subscriptions.register("focus-change", || {
        let _ = execute!(io::stdout(), DisableFocusChange);
    });
    Ok(())
}

/// Terminal size in cells, minus the status line.
pub fn grid_area() -> io::Result<(u16, u16)> {
    let (width, height) = terminal::size()?;
    Ok((width.max(1), height.saturating_sub(STATUS_ROWS).max(1)))
}

/// Key actions for the interactive display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Export,
    Pause,
}

/// Parse keyboard input into actions
pub fn parse_key_event(event: KeyEvent) -> Action {
    if event.kind == KeyEventKind::Release {
        return Action::None;
    }
    match event.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('s') => Action::Export,
        KeyCode::Char(' ') => Action::Pause,
        _ => Action::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(Action),
    PointerMoved { column: u16, row: u16 },
    PointerLeft,
    Resized { width: u16, height: u16 },
}

pub fn translate_event(event: Event) -> Option<InputEvent> {
    match event {
        Event::Key(key) => match parse_key_event(key) {
            Action::None => None,
            action => Some(InputEvent::Key(action)),
        },
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(InputEvent::PointerMoved {
                column: mouse.column,
                row: mouse.row,
            }),
            _ => None,
        },
        Event::FocusLost => Some(InputEvent::PointerLeft),
        Event::Resize(width, height) => Some(InputEvent::Resized { width, height }),
        _ => None,
    }
}

/// Waits up to `timeout` for the next event that matters to the display.
pub fn poll_input(timeout: Duration) -> io::Result<Option<InputEvent>> {
    if event::poll(timeout)? {
        return Ok(translate_event(event::read()?));
    }
    Ok(None)
}

/// Coalesces terminal resize bursts. Only the newest size is kept, and it
/// is applied at most once per throttle interval.
#[derive(Debug, Clone)]
pub struct ResizeGate {
    throttle: ResizeThrottle,
    pending: Option<(u16, u16)>,
}

impl ResizeGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            throttle: ResizeThrottle::new(interval),
            pending: None,
        }
    }

    pub fn record(&mut self, width: u16, height: u16) {
        self.pending = Some((width, height));
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The size to apply now, if one is waiting and the interval allows.
    pub fn take_due(&mut self, now: Instant) -> Option<(u16, u16)> {
        if self.pending.is_none() || !self.throttle.admit(now) {
            return None;
        }
        self.pending.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCell {
    pub glyph: char,
    pub color: Rgb,
}

/// Cell-addressed surface flushed to the terminal with truecolor escapes.
/// Draw positions are whole cells, matching `Geometry::unit`.
#[derive(Debug, Clone)]
pub struct TerminalSurface {
    cols: u16,
    rows: u16,
    background: Rgb,
    cells: Vec<TerminalCell>,
}

impl TerminalSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        let background = Rgb::WHITE;
        Self {
            cols,
            rows,
            background,
            cells: vec![
                TerminalCell {
                    glyph: ' ',
                    color: background,
                };
                cols as usize * rows as usize
            ],
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&TerminalCell> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.cells.get(y as usize * self.cols as usize + x as usize)
    }

    /// Draws the current contents onto another surface laid out by
    /// `geometry`, for example a canvas for export.
    pub fn replay(&self, surface: &mut dyn GlyphSurface, geometry: &Geometry) {
        surface.clear(self.background);
        for (idx, cell) in self.cells.iter().enumerate() {
            if cell.glyph == ' ' {
                continue;
            }
            let x = (idx % self.cols as usize) as u32;
            let y = (idx / self.cols as usize) as u32;
            let (px, py) = geometry.cell_origin(x, y);
            surface.draw_glyph(px, py, cell.glyph, cell.color);
        }
    }

    pub fn flush_to<W: Write>(&self, out: &mut W, status: &str) -> io::Result<()> {
        let background = to_color(self.background);
        queue!(out, SetBackgroundColor(background))?;
        let mut current = None;
        for (y, row) in self.cells.chunks(self.cols.max(1) as usize).enumerate() {
            queue!(out, MoveTo(0, y as u16))?;
            for cell in row {
                if current != Some(cell.color) {
                    queue!(out, SetForegroundColor(to_color(cell.color)))?;
                    current = Some(cell.color);
                }
                queue!(out, Print(cell.glyph))?;
            }
        }
        queue!(
            out,
            ResetColor,
            MoveTo(0, self.rows),
            Clear(ClearType::CurrentLine),
            Print(status)
        )?;
        out.flush()
    }
}

impl GlyphSurface for TerminalSurface {
    fn clear(&mut self, color: Rgb) {
        self.background = color;
        for cell in &mut self.cells {
            *cell = TerminalCell { glyph: ' ', color };
        }
    }

    fn draw_glyph(&mut self, x: f32, y: f32, glyph: char, color: Rgb) {
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.cols as usize || y >= self.rows as usize {
            return;
        }
        self.cells[y * self.cols as usize + x] = TerminalCell { glyph, color };
    }
}

fn to_color(color: Rgb) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

/// Buffered stdout writer for the interactive display
pub struct TerminalDisplay {
    buffer: BufWriter<Stdout>,
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            buffer: BufWriter::new(io::stdout()),
        }
    }

    pub fn present(&mut self, surface: &TerminalSurface, status: &str) -> io::Result<()> {
        surface.flush_to(&mut self.buffer, status)
    }

    pub fn clear(&mut self) -> io::Result<()> {
        queue!(self.buffer, ResetColor, Clear(ClearType::All))?;
        self.buffer.flush()
    }
}
