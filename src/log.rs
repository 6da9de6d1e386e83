//! Leveled console logger and progress reporter.
//!
//! Mirrors the plain, framework-free reporting style the CLI has always
//! used — no `log`/`tracing` facade, just a small leveled printer gated on
//! an explicit level, plus a progress counter for `create`/`append`.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Quiet,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl Level {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet"   => Some(Level::Quiet),
            "error"   => Some(Level::Error),
            "warning" => Some(Level::Warning),
            "info"    => Some(Level::Info),
            "debug"   => Some(Level::Debug),
            "trace"   => Some(Level::Trace),
            _         => None,
        }
    }
}

/// Leveled logger. Cloned cheaply (just a level); writes go to stderr.
#[derive(Debug, Clone, Copy)]
pub struct VfaLog {
    level: Level,
}

impl VfaLog {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn emit(&self, at: Level, tag: &str, msg: &std::fmt::Arguments) {
        if at > self.level {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S%.3f");
        eprintln!("[{now}] {tag:<7} {msg}");
    }

    pub fn error(&self, args: std::fmt::Arguments) { self.emit(Level::Error, "ERROR", &args) }
    pub fn warning(&self, args: std::fmt::Arguments) { self.emit(Level::Warning, "WARN", &args) }
    pub fn info(&self, args: std::fmt::Arguments) { self.emit(Level::Info, "INFO", &args) }
    pub fn debug(&self, args: std::fmt::Arguments) { self.emit(Level::Debug, "DEBUG", &args) }
    pub fn trace(&self, args: std::fmt::Arguments) { self.emit(Level::Trace, "TRACE", &args) }
}

impl Default for VfaLog {
    fn default() -> Self { Self::new(Level::Warning) }
}

#[macro_export]
macro_rules! vlog_info {
    ($log:expr, $($arg:tt)*) => { $log.info(format_args!($($arg)*)) };
}
#[macro_export]
macro_rules! vlog_debug {
    ($log:expr, $($arg:tt)*) => { $log.debug(format_args!($($arg)*)) };
}
#[macro_export]
macro_rules! vlog_warn {
    ($log:expr, $($arg:tt)*) => { $log.warning(format_args!($($arg)*)) };
}
#[macro_export]
macro_rules! vlog_trace {
    ($log:expr, $($arg:tt)*) => { $log.trace(format_args!($($arg)*)) };
}

/// Tracks files/bytes processed during create/append and reports throughput.
pub struct Progress {
    started:     Instant,
    total_files: u64,
    total_bytes: u64,
    done_files:  u64,
    done_bytes:  u64,
}

impl Progress {
    pub fn new(total_files: u64, total_bytes: u64) -> Self {
        Self { started: Instant::now(), total_files, total_bytes, done_files: 0, done_bytes: 0 }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.done_files += 1;
        self.done_bytes += bytes;
    }

    pub fn ratio(&self) -> f64 {
        if self.total_bytes == 0 { 1.0 } else { self.done_bytes as f64 / self.total_bytes as f64 }
    }

    pub fn rate_mib_s(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64().max(1e-6);
        (self.done_bytes as f64 / 1_048_576.0) / secs
    }

    pub fn eta_secs(&self) -> f64 {
        let r = self.rate_mib_s();
        if r <= 0.0 || self.total_bytes == 0 { return 0.0; }
        let remaining_mib = (self.total_bytes.saturating_sub(self.done_bytes)) as f64 / 1_048_576.0;
        remaining_mib / r
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} files, {:.1} MiB, {:.1} MiB/s, eta {:.0}s",
            self.done_files, self.total_files,
            self.done_bytes as f64 / 1_048_576.0,
            self.rate_mib_s(),
            self.eta_secs(),
        )
    }
}
