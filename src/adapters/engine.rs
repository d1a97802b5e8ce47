//! Build engine process invocation.
//!
//! [`BuildEngine`] is the seam between the orchestrator and MSBuild;
//! [`MsBuildEngine`] spawns the real executable, drains its standard output
//! on a helper thread and waits for it, optionally bounded by a timeout or a
//! [`CancelToken`]. The same bound covers collecting the output after exit,
//! since node processes started by MSBuild can inherit and hold the pipe.

use crate::domain::constants::{DEFAULT_VERBOSITY, MANIFEST_FILE_NAME, TARGET_NAME};
use crate::infra::error::{SigningError, SigningResult};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// One run of the build engine against a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    /// Manifest the engine builds; passed by file name relative to `working_dir`
    pub manifest_path: PathBuf,
    /// Working directory of the child process
    pub working_dir: PathBuf,
    /// Target to build
    pub target: String,
    /// MSBuild verbosity switch value
    pub verbosity: String,
}

impl EngineInvocation {
    /// Invocation with the default target and minimal verbosity.
    pub fn new(manifest_path: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            working_dir: working_dir.into(),
            target: TARGET_NAME.to_string(),
            verbosity: DEFAULT_VERBOSITY.to_string(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    /// Manifest file name as seen from the working directory.
    #[must_use]
    pub fn manifest_file_name(&self) -> String {
        self.manifest_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| MANIFEST_FILE_NAME.to_string())
    }

    /// Arguments: `/v:<verbosity> /target:<target> <manifest>`.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            format!("/v:{}", self.verbosity),
            format!("/target:{}", self.target),
            self.manifest_file_name(),
        ]
    }

    /// Human-readable command line, e.g. `MSBuild.exe /v:m /target:RoslynSign build.proj`.
    #[must_use]
    pub fn command_line(&self, program: &Path) -> String {
        let program = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        format!("{program} {}", self.args().join(" "))
    }
}

/// Exit code and captured standard output of a finished engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ExecutionResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Cooperative cancellation for a running engine.
///
/// Cloning shares the flag; cancelling any clone stops the wait and kills the
/// child.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Process options for [`MsBuildEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Kill the engine after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Pipe standard error and append it to the captured output instead of
    /// inheriting the parent's
    pub capture_stderr: bool,
    /// How often the wait loop checks the child, the timeout and cancellation
    pub poll_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            capture_stderr: false,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Something that can build a signing manifest.
pub trait BuildEngine: Send + Sync {
    /// Path of the executable, used for display.
    fn program(&self) -> &Path;

    /// Run the engine and block until it exits.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process cannot start, `EngineTimedOut` or
    /// `Cancelled` if the wait was cut short. A non-zero exit is not an error
    /// here; it is reported through [`ExecutionResult::exit_code`].
    fn run(
        &self,
        invocation: &EngineInvocation,
        cancel: &CancelToken,
    ) -> SigningResult<ExecutionResult>;
}

/// The real MSBuild executable.
#[derive(Debug, Clone)]
pub struct MsBuildEngine {
    program: PathBuf,
    options: EngineOptions,
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
}

impl MsBuildEngine {
    pub fn new(program: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            program: program.into(),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn command(&self, invocation: &EngineInvocation) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(invocation.args())
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        if self.options.capture_stderr {
            command.stderr(Stdio::piped());
        }
        command
    }

    fn deadline_passed(&self, start: Instant) -> bool {
        self.options
            .timeout
            .is_some_and(|timeout| start.elapsed() >= timeout)
    }

    fn wait(
        &self,
        child: &mut Child,
        start: Instant,
        cancel: &CancelToken,
    ) -> SigningResult<WaitOutcome> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(WaitOutcome::Exited(status)),
                Ok(None) => {}
                Err(e) => {
                    kill(child);
                    return Err(SigningError::IoError(format!(
                        "Failed waiting for MSBuild: {e}"
                    )));
                }
            }

            if cancel.is_cancelled() {
                log::warn!("Cancellation requested, killing MSBuild");
                kill(child);
                return Ok(WaitOutcome::Cancelled);
            }

            if let Some(timeout) = self.options.timeout {
                if start.elapsed() >= timeout {
                    log::warn!("MSBuild exceeded {}s, killing it", timeout.as_secs());
                    kill(child);
                    return Ok(WaitOutcome::TimedOut(timeout));
                }
            }

            thread::sleep(self.options.poll_interval);
        }
    }

    /// Read the pipes until they close, the deadline passes or `cancel` fires.
    ///
    /// Returns false when collection stopped early; whatever arrived by then
    /// is kept.
    fn collect(&self, pipes: &mut [&mut Capture], start: Instant, cancel: &CancelToken) -> bool {
        while pipes.iter().any(|pipe| pipe.open) {
            if cancel.is_cancelled() || self.deadline_passed(start) {
                return false;
            }
            for pipe in pipes.iter_mut() {
                pipe.poll(self.options.poll_interval);
            }
        }
        true
    }
}

impl BuildEngine for MsBuildEngine {
    fn program(&self) -> &Path {
        &self.program
    }

    fn run(
        &self,
        invocation: &EngineInvocation,
        cancel: &CancelToken,
    ) -> SigningResult<ExecutionResult> {
        log::debug!(
            "Spawning {} in {}",
            self.program.display(),
            invocation.working_dir.display()
        );

        let mut child = self.command(invocation).spawn().map_err(|e| {
            SigningError::SpawnError(format!("{}: {e}", self.program.display()))
        })?;

        let start = Instant::now();
        let mut stdout = Capture::from_pipe(child.stdout.take());
        let mut stderr = Capture::from_pipe(child.stderr.take());

        match self.wait(&mut child, start, cancel)? {
            WaitOutcome::Exited(status) => {
                if !self.collect(&mut [&mut stdout, &mut stderr], start, cancel) {
                    log::warn!(
                        "MSBuild exited but its output pipe is still held open, \
                         keeping the output captured so far"
                    );
                }
                let mut output = stdout.into_text();
                let errors = stderr.into_text();
                if !errors.is_empty() {
                    if !output.is_empty() && !output.ends_with('\n') {
                        output.push('\n');
                    }
                    output.push_str(&errors);
                }
                log::debug!("MSBuild exited with {status}");
                Ok(ExecutionResult {
                    exit_code: status.code(),
                    output,
                })
            }
            // Reader threads stay detached and exit once the pipes close.
            WaitOutcome::TimedOut(timeout) => Err(SigningError::EngineTimedOut {
                timeout,
                manifest_path: invocation.manifest_path.clone(),
            }),
            WaitOutcome::Cancelled => Err(SigningError::Cancelled),
        }
    }
}

/// Output of one child pipe, read on a helper thread and handed over in chunks.
struct Capture {
    chunks: Option<Receiver<Vec<u8>>>,
    bytes: Vec<u8>,
    open: bool,
}

impl Capture {
    fn from_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let chunks = pipe.map(drain);
        Self {
            open: chunks.is_some(),
            chunks,
            bytes: Vec::new(),
        }
    }

    /// Take what has arrived, waiting at most `wait` for the first chunk.
    fn poll(&mut self, wait: Duration) {
        let Some(chunks) = self.chunks.as_ref().filter(|_| self.open) else {
            return;
        };
        match chunks.recv_timeout(wait) {
            Ok(chunk) => {
                self.bytes.extend_from_slice(&chunk);
                self.bytes.extend(chunks.try_iter().flatten());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.open = false,
        }
    }

    fn into_text(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match pipe.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if sender.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    log::warn!("Failed to read MSBuild output: {e}");
                    break;
                }
            }
        }
    });
    receiver
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
