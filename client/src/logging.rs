//! tracing setup for the browser: events go to the devtools console at the
//! matching level and to a capped log element on the page.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use web_sys::{Document, Element};

use crate::config::{DEFAULT_LOG_FILTER, LOG_ELEMENT_ID, MAX_LOG_LINES};

thread_local! {
    static BACKLOG: RefCell<Backlog> = RefCell::new(Backlog::new(MAX_LOG_LINES));
}

/// Install the global subscriber. Safe to call twice; the second call is a no-op.
pub fn init(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        web_sys::console::warn_1(&format!("bad log filter {filter:?}: {e}").into());
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(PageLog);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

#[derive(Debug, Clone, Copy)]
struct PageLog;

impl<'a> MakeWriter<'a> for PageLog {
    type Writer = PageLogLine;

    fn make_writer(&'a self) -> Self::Writer {
        PageLogLine::new(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        PageLogLine::new(*meta.level())
    }
}

/// Buffers one formatted event; emitted when dropped.
struct PageLogLine {
    level: Level,
    buf: Vec<u8>,
}

impl PageLogLine {
    fn new(level: Level) -> Self {
        Self {
            level,
            buf: Vec::with_capacity(128),
        }
    }
}

impl io::Write for PageLogLine {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PageLogLine {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let line = text.trim_end();
        if line.is_empty() {
            return;
        }
        to_console(self.level, line);
        append_to_page(line);
    }
}

fn to_console(level: Level, line: &str) {
    let value = wasm_bindgen::JsValue::from_str(line);
    match level {
        Level::ERROR => web_sys::console::error_1(&value),
        Level::WARN => web_sys::console::warn_1(&value),
        Level::INFO => web_sys::console::info_1(&value),
        _ => web_sys::console::debug_1(&value),
    }
}

fn append_to_page(line: &str) {
    let line = stamped(chrono::Local::now(), line);
    let Some((document, panel)) = log_panel() else {
        BACKLOG.with(|backlog| backlog.borrow_mut().push(line));
        return;
    };
    let pending = BACKLOG.with(|backlog| backlog.borrow_mut().take());
    for text in pending.iter().chain(std::iter::once(&line)) {
        append_entry(&document, &panel, text);
    }
    trim_panel(&panel);
}

/// Move lines logged before the log element existed onto the page.
pub fn flush_backlog() {
    let Some((document, panel)) = log_panel() else {
        return;
    };
    for text in BACKLOG.with(|backlog| backlog.borrow_mut().take()) {
        append_entry(&document, &panel, &text);
    }
    trim_panel(&panel);
}

fn log_panel() -> Option<(Document, Element)> {
    let document = web_sys::window()?.document()?;
    let panel = document.get_element_by_id(LOG_ELEMENT_ID)?;
    Some((document, panel))
}

fn append_entry(document: &Document, panel: &Element, text: &str) {
    let Ok(entry) = document.create_element("div") else {
        return;
    };
    entry.set_text_content(Some(text));
    let _ = panel.append_child(&entry);
}

fn trim_panel(panel: &Element) {
    while panel.child_element_count() as usize > MAX_LOG_LINES {
        match panel.first_element_child() {
            Some(oldest) => oldest.remove(),
            None => break,
        }
    }
}

/// Lines written before the page has somewhere to show them. Oldest lines
/// are dropped once `cap` is reached.
#[derive(Debug)]
struct Backlog {
    cap: usize,
    lines: VecDeque<String>,
}

impl Backlog {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            lines: VecDeque::new(),
        }
    }

    fn push(&mut self, line: String) {
        if self.cap == 0 {
            return;
        }
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn take(&mut self) -> Vec<String> {
        self.lines.drain(..).collect()
    }
}

fn stamped<Tz: chrono::TimeZone>(at: chrono::DateTime<Tz>, line: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{} {line}", at.format("%H:%M:%S"))
}
