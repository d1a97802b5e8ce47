//! Progress reporting for signing runs.
//!
//! The orchestrator reports through [`ProgressReporter`]: the command line it
//! is about to run, the generated manifest, and the build engine output when
//! the engine fails.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Progress indicator types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStyle {
    /// Messages plus every text block (manifest and engine output)
    Full,
    /// Messages plus engine output; the manifest is not echoed
    Compact,
    /// No visual indicator; blocks only reach the log
    Silent,
}

/// Multi-line text a reporter may be asked to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBlock {
    /// The generated signing project
    Manifest,
    /// Captured standard output of a failed build engine run
    EngineOutput,
}

impl TextBlock {
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            TextBlock::Manifest => "Generated project file",
            TextBlock::EngineOutput => "MSBuild failed!!!",
        }
    }
}

/// Progress reporter trait for signing runs
pub trait ProgressReporter: Send + Sync {
    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Show a block of multi-line text
    fn show_block(&self, block: TextBlock, text: &str);

    /// Mark the operation as completed
    fn finish(&self);

    /// Mark the operation as failed with error message
    fn finish_with_error(&self, error: &str);
}

/// Reporter writing through the `log` facade.
///
/// Engine output is logged at error level so it survives `RUST_LOG=warn`.
pub struct LogProgress;

/// Send a block the terminal does not show to the log instead.
///
/// Engine output goes out at error level so a failure is never silent; the
/// manifest only at debug level.
fn log_hidden_block(block: TextBlock, text: &str) {
    match block {
        TextBlock::Manifest => log::debug!("{}\n{text}", block.title()),
        TextBlock::EngineOutput => log::error!("{}\n{text}", block.title()),
    }
}

impl ProgressReporter for LogProgress {
    fn set_message(&self, message: &str) {
        log::info!("{message}");
    }

    fn show_block(&self, block: TextBlock, text: &str) {
        match block {
            TextBlock::Manifest => log::info!("{}\n{text}", block.title()),
            TextBlock::EngineOutput => log::error!("{}\n{text}", block.title()),
        }
    }

    fn finish(&self) {
        log::info!("Signing completed");
    }

    fn finish_with_error(&self, error: &str) {
        log::error!("Signing failed: {error}");
    }
}

/// Terminal-based progress output
pub struct TerminalProgress {
    style: ProgressStyle,
    start_time: Instant,
    current_message: Arc<Mutex<String>>,
    is_finished: Arc<Mutex<bool>>,
}

impl TerminalProgress {
    /// Create a new terminal progress indicator
    #[must_use]
    pub fn new(style: ProgressStyle) -> Self {
        Self {
            style,
            start_time: Instant::now(),
            current_message: Arc::new(Mutex::new(String::new())),
            is_finished: Arc::new(Mutex::new(false)),
        }
    }

    fn shows(&self, block: TextBlock) -> bool {
        match self.style {
            ProgressStyle::Full => true,
            ProgressStyle::Compact => block == TextBlock::EngineOutput,
            ProgressStyle::Silent => false,
        }
    }

    fn finished(&self) -> bool {
        self.is_finished.lock().map(|f| *f).unwrap_or(true)
    }

    fn mark_finished(&self) -> String {
        if let Ok(mut finished) = self.is_finished.lock() {
            *finished = true;
        }
        self.current_message
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for TerminalProgress {
    fn set_message(&self, message: &str) {
        if let Ok(mut current) = self.current_message.lock() {
            *current = message.to_string();
        }
        if self.style != ProgressStyle::Silent && !self.finished() {
            println!("[*] {message}");
        }
    }

    fn show_block(&self, block: TextBlock, text: &str) {
        if !self.shows(block) {
            log_hidden_block(block, text);
            return;
        }
        let mut stdout = io::stdout().lock();
        // Display only; a closed stdout must not abort signing.
        let _ = writeln!(stdout, "{}", block.title());
        let _ = writeln!(stdout, "{text}");
        let _ = stdout.flush();
    }

    fn finish(&self) {
        let message = self.mark_finished();
        if self.style == ProgressStyle::Silent {
            return;
        }
        println!(
            "[+] {} - Completed in {:.1}s",
            message,
            self.start_time.elapsed().as_secs_f64()
        );
    }

    fn finish_with_error(&self, error: &str) {
        let message = self.mark_finished();
        if self.style == ProgressStyle::Silent {
            return;
        }
        println!(
            "[!] {} - Failed after {:.1}s: {}",
            message,
            self.start_time.elapsed().as_secs_f64(),
            error
        );
    }
}

/// Progress reporter for silent operations
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn set_message(&self, _message: &str) {}
    fn show_block(&self, block: TextBlock, text: &str) {
        log_hidden_block(block, text);
    }
    fn finish(&self) {}
    fn finish_with_error(&self, _error: &str) {}
}

/// Progress factory for creating appropriate progress indicators
pub struct ProgressFactory;

impl ProgressFactory {
    /// Terminal output when stdout is a terminal, the log otherwise.
    #[must_use]
    pub fn create_reporter(style: ProgressStyle) -> Arc<dyn ProgressReporter> {
        match style {
            ProgressStyle::Silent => Arc::new(SilentProgress),
            _ if io::stdout().is_terminal() => Arc::new(TerminalProgress::new(style)),
            _ => Arc::new(LogProgress),
        }
    }
}
