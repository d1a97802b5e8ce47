//! Test doubles for the build engine and the progress channel.

use sign_roslyn::{
    BuildEngine, CancelToken, EngineInvocation, ExecutionResult, ProgressReporter, SigningResult,
    TextBlock,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Everything a reporter was told, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Message(String),
    Block(TextBlock, String),
    Finished,
    Failed(String),
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn block(&self, kind: TextBlock) -> Option<String> {
        self.events().into_iter().find_map(|e| match e {
            Recorded::Block(k, text) if k == kind => Some(text),
            _ => None,
        })
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressReporter for RecordingProgress {
    fn set_message(&self, message: &str) {
        self.push(Recorded::Message(message.to_string()));
    }

    fn show_block(&self, block: TextBlock, text: &str) {
        self.push(Recorded::Block(block, text.to_string()));
    }

    fn finish(&self) {
        self.push(Recorded::Finished);
    }

    fn finish_with_error(&self, error: &str) {
        self.push(Recorded::Failed(error.to_string()));
    }
}

/// Engine that exits with a fixed code and records what it was asked to build.
pub struct FakeEngine {
    program: PathBuf,
    exit_code: Option<i32>,
    output: String,
    runs: Mutex<Vec<FakeRun>>,
}

/// One observed run: the invocation and the manifest on disk at that moment.
#[derive(Debug, Clone)]
pub struct FakeRun {
    pub invocation: EngineInvocation,
    pub manifest: Option<String>,
}

impl FakeEngine {
    pub fn exiting(exit_code: i32, output: &str) -> Arc<Self> {
        Arc::new(Self {
            program: PathBuf::from("/opt/msbuild/14.0/Bin/MSBuild.exe"),
            exit_code: Some(exit_code),
            output: output.to_string(),
            runs: Mutex::new(Vec::new()),
        })
    }

    pub fn runs(&self) -> Vec<FakeRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl BuildEngine for FakeEngine {
    fn program(&self) -> &Path {
        &self.program
    }

    fn run(
        &self,
        invocation: &EngineInvocation,
        _cancel: &CancelToken,
    ) -> SigningResult<ExecutionResult> {
        let manifest_on_disk = invocation
            .working_dir
            .join(invocation.manifest_file_name());
        self.runs.lock().unwrap().push(FakeRun {
            invocation: invocation.clone(),
            manifest: std::fs::read_to_string(manifest_on_disk).ok(),
        });
        Ok(ExecutionResult {
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }
}

/// Shares one `FakeEngine` between the orchestrator and the test.
pub struct SharedEngine(pub Arc<FakeEngine>);

impl BuildEngine for SharedEngine {
    fn program(&self) -> &Path {
        self.0.program()
    }

    fn run(
        &self,
        invocation: &EngineInvocation,
        cancel: &CancelToken,
    ) -> SigningResult<ExecutionResult> {
        self.0.run(invocation, cancel)
    }
}
