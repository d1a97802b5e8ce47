//! SignOrchestrator behaviour against a simulated build engine.

mod common;

use common::fakes::{FakeEngine, Recorded, RecordingProgress, SharedEngine};
use common::manifest_reader::parse_manifest;
use sign_roslyn::{
    ManifestSettings, SignConfiguration, SignLayout, SignOrchestrator, SigningError,
    SigningRequest, TextBlock,
};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    engine: Arc<FakeEngine>,
    progress: Arc<RecordingProgress>,
    orchestrator: SignOrchestrator,
}

fn harness(exit_code: i32, output: &str) -> Harness {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::exiting(exit_code, output);
    let progress = RecordingProgress::new();
    let layout = SignLayout::new(
        dir.path(),
        dir.path().join("Binaries"),
        dir.path().join("src"),
    );
    let orchestrator = SignOrchestrator::with_engine(
        layout,
        ManifestSettings::default(),
        Box::new(SharedEngine(engine.clone())),
    )
    .with_reporter(progress.clone());

    Harness {
        dir,
        engine,
        progress,
        orchestrator,
    }
}

#[test]
fn test_exit_zero_returns_normally() {
    let h = harness(0, "Build succeeded.");
    let report = h
        .orchestrator
        .sign(&SigningRequest::new(["csc.exe", "vbc.exe"]))
        .unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.manifest_path, h.dir.path().join("build.proj"));
    assert_eq!(h.progress.events().last(), Some(&Recorded::Finished));
    assert!(h.progress.block(TextBlock::EngineOutput).is_none());
}

#[test]
fn test_non_zero_exit_reports_output_before_failing() {
    let h = harness(1, "build.proj : error MSB4057: The target \"RoslynSign\" does not exist.");
    let err = h
        .orchestrator
        .sign(&SigningRequest::new(["csc.exe"]))
        .unwrap_err();

    match &err {
        SigningError::EngineFailed {
            exit_code,
            output,
            manifest_path,
        } => {
            assert_eq!(*exit_code, Some(1));
            assert!(output.contains("MSB4057"));
            assert_eq!(manifest_path, &h.dir.path().join("build.proj"));
        }
        other => panic!("Expected EngineFailed, got: {other:?}"),
    }

    let events = h.progress.events();
    let output_at = events
        .iter()
        .position(|e| matches!(e, Recorded::Block(TextBlock::EngineOutput, text) if text.contains("MSB4057")))
        .expect("engine output must be reported");
    let failed_at = events
        .iter()
        .position(|e| matches!(e, Recorded::Failed(_)))
        .expect("failure must be reported");
    assert!(output_at < failed_at);
}

#[test]
fn test_command_line_and_manifest_reported_before_run() {
    let h = harness(0, "");
    h.orchestrator
        .sign(&SigningRequest::new(["a.dll"]))
        .unwrap();

    let events = h.progress.events();
    assert_eq!(
        events[0],
        Recorded::Message("MSBuild.exe /v:m /target:RoslynSign build.proj".to_string())
    );
    let manifest = h.progress.block(TextBlock::Manifest).unwrap();
    let runs = h.engine.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].manifest.as_deref(), Some(manifest.as_str()));
}

#[test]
fn test_engine_runs_in_run_directory_against_manifest() {
    let h = harness(0, "");
    h.orchestrator.sign(&SigningRequest::default()).unwrap();

    let run = &h.engine.runs()[0];
    assert_eq!(run.invocation.working_dir, h.dir.path());
    assert_eq!(
        run.invocation.args(),
        ["/v:m", "/target:RoslynSign", "build.proj"]
    );
    assert!(parse_manifest(run.manifest.as_deref().unwrap()).items.is_empty());
}

#[test]
fn test_second_call_overwrites_manifest() {
    let h = harness(0, "");
    let path = h.dir.path().join("build.proj");

    h.orchestrator
        .sign(&SigningRequest::new(["first.dll", "second.dll", "third.dll"]))
        .unwrap();
    h.orchestrator
        .sign(&SigningRequest::new(["only.dll"]))
        .unwrap();

    let on_disk = std::fs::read_to_string(&path).unwrap();
    let parsed = parse_manifest(&on_disk);
    assert_eq!(parsed.includes(), ["only.dll"]);
    assert_eq!(on_disk.matches("<Project").count(), 1);
    assert_eq!(h.orchestrator.manifest_path(), path);
}

#[test]
fn test_temp_and_binaries_directories_embedded_verbatim() {
    let h = harness(0, "");
    h.orchestrator.sign(&SigningRequest::new(["a.dll"])).unwrap();

    let manifest = h.engine.runs()[0].manifest.clone().unwrap();
    let parsed = parse_manifest(&manifest);
    assert_eq!(
        parsed.sign_files["BinariesDirectory"],
        h.dir.path().join("Binaries").display().to_string()
    );
    assert_eq!(
        parsed.sign_files["IntermediatesDirectory"],
        std::env::temp_dir().display().to_string()
    );
}

#[test]
fn test_missing_engine_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let mut config = SignConfiguration::default();
    config.engine.search_paths = vec![
        dir.path().join("a").join("MSBuild.exe").display().to_string(),
        dir.path().join("b").join("MSBuild.exe").display().to_string(),
    ];

    let result = SignOrchestrator::from_config(
        SignLayout::new(dir.path(), dir.path(), dir.path()),
        &config,
    );

    match result {
        Err(SigningError::EngineNotFound { attempted }) => assert_eq!(attempted.len(), 2),
        Err(other) => panic!("Expected EngineNotFound, got: {other:?}"),
        Ok(_) => panic!("Expected EngineNotFound, got an orchestrator"),
    }
    assert!(!dir.path().join("build.proj").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unwritable_run_directory_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::exiting(0, "");
    let layout = SignLayout::new(dir.path().join("missing"), dir.path(), dir.path());
    let orchestrator = SignOrchestrator::with_engine(
        layout,
        ManifestSettings::default(),
        Box::new(SharedEngine(engine.clone())),
    );

    let err = orchestrator
        .sign(&SigningRequest::new(["a.dll"]))
        .unwrap_err();
    assert!(matches!(err, SigningError::IoError(_)));
    assert!(engine.runs().is_empty());
}

#[test]
fn test_configured_target_and_verbosity() {
    let dir = TempDir::new().unwrap();
    let engine = FakeEngine::exiting(0, "");
    let settings = ManifestSettings {
        target_name: "SignAll".to_string(),
        ..ManifestSettings::default()
    };
    let orchestrator = SignOrchestrator::with_engine(
        SignLayout::new(dir.path(), dir.path(), dir.path()),
        settings,
        Box::new(SharedEngine(engine.clone())),
    )
    .with_verbosity("n");

    orchestrator.sign(&SigningRequest::new(["a.dll"])).unwrap();
    let run = &engine.runs()[0];
    assert_eq!(run.invocation.args(), ["/v:n", "/target:SignAll", "build.proj"]);
    assert_eq!(
        parse_manifest(run.manifest.as_deref().unwrap()).target.as_deref(),
        Some("SignAll")
    );
}
