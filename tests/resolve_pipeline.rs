mod common;

use common::{MockTransport, PREFIX};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use vaimm::fetch::{DownloadTask, FetchEngine, ProgressEvent, RetryPolicy};
use vaimm::metadata::loader::load_metadata_dir;
use vaimm::models::{backend_files, missing, CapabilityProfile, IncludeFilter, ModelResolver};

const ALQ: &str = r#"{
    "shortName": "alq",
    "version": 13,
    "gui": { "name": "Artemis LQ", "desc": "Denoise and sharpen low quality input" },
    "backends": {
        "onnx": {
            "scales": {
                "1": { "nets": ["fgnet-fp16-[H]x[W]-[S]x-ox.tz"], "blocks": [256, 352, 480, 640] }
            }
        },
        "tensorrt": {
            "capabilities": [806, 809],
            "scales": {
                "1": { "nets": ["fgnet-fp16-[H]x[W]-[S]x-[C]-[R]-rt.tz"], "blocks": [256, 352] }
            }
        }
    }
}"#;

const PROB: &str = r#"{
    "shortName": "prob",
    "version": "4",
    "displayName": "Proteus",
    "backends": {
        "onnx": {
            "scales": {
                "1": { "nets": ["ppnet-[H]x[W]-ox.tz", "ppnet-[H]x[W]-aux-ox.tz"], "blocks": [128, 128] }
            }
        }
    }
}"#;

const BROKEN: &str = r#"{
    "shortName": "brk",
    "version": 1,
    "backends": {
        "onnx": { "scales": { "2": { "nets": ["x-[H]x[W].tz"], "blocks": [64, 64, 96] } } }
    }
}"#;

const PRESETS: &str = r#"{ "presets": [ { "name": "default" } ] }"#;

fn write_metadata(dir: &Path) {
    fs::write(dir.join("alq-13.json"), ALQ).unwrap();
    fs::write(dir.join("prob-4.json"), PROB).unwrap();
    fs::write(dir.join("brk-1.json"), BROKEN).unwrap();
    fs::write(dir.join("presets.json"), PRESETS).unwrap();
    fs::write(dir.join("notes.txt"), "not metadata").unwrap();
}

#[test]
fn test_resolves_onnx_backend_from_directory() {
    let temp_dir = TempDir::new().unwrap();
    write_metadata(temp_dir.path());

    let records = load_metadata_dir(temp_dir.path()).unwrap();
    assert_eq!(records.len(), 3);

    let resolver = ModelResolver::new("onnx", None);
    let models: Vec<_> = resolver.resolve_all(&records).collect();

    let keys: Vec<_> = models.iter().map(|m| m.key()).collect();
    assert_eq!(keys, vec!["alq-13", "prob-4"]);
    assert_eq!(models[0].name, "Artemis LQ");
    assert_eq!(models[1].name, "Proteus");

    let files = backend_files(&models, &IncludeFilter::default());
    assert_eq!(
        files,
        vec![
            "alq-v13-fgnet-fp16-256x352-1x-ox.tz",
            "alq-v13-fgnet-fp16-480x640-1x-ox.tz",
            "prob-v4-ppnet-128x128-ox.tz",
            "prob-v4-ppnet-128x128-aux-ox.tz",
        ]
    );
}

#[test]
fn test_capability_gated_backend() {
    let temp_dir = TempDir::new().unwrap();
    write_metadata(temp_dir.path());
    let records = load_metadata_dir(temp_dir.path()).unwrap();

    let without_profile = ModelResolver::new("tensorrt", None);
    assert_eq!(without_profile.resolve_all(&records).count(), 0);

    let profile = CapabilityProfile::for_gpu_family("rtx30", "linux").unwrap();
    let resolver = ModelResolver::new("tensorrt", Some(profile));
    let models: Vec<_> = resolver.resolve_all(&records).collect();

    assert_eq!(models.len(), 1);
    assert_eq!(
        models[0].files,
        vec!["alq-v13-fgnet-fp16-256x352-1x-806-8517-rt.tz"]
    );

    let rtx20 = CapabilityProfile::for_gpu_family("RTX20", "linux").unwrap();
    let gated = ModelResolver::new("tensorrt", Some(rtx20));
    assert_eq!(gated.resolve_all(&records).count(), 0);
}

#[test]
fn test_include_filter_and_missing_files() {
    let temp_dir = TempDir::new().unwrap();
    let json_dir = temp_dir.path().join("json");
    let data_dir = temp_dir.path().join("models");
    fs::create_dir_all(&json_dir).unwrap();
    fs::create_dir_all(&data_dir).unwrap();
    write_metadata(&json_dir);

    let records = load_metadata_dir(&json_dir).unwrap();
    let models: Vec<_> = ModelResolver::new("onnx", None)
        .resolve_all(&records)
        .collect();

    let files = backend_files(&models, &IncludeFilter::parse("prob-4"));
    assert_eq!(files.len(), 2);

    fs::write(data_dir.join("prob-v4-ppnet-128x128-ox.tz"), b"present").unwrap();
    let needed = missing(&files, &data_dir);
    assert_eq!(needed, vec![data_dir.join("prob-v4-ppnet-128x128-aux-ox.tz")]);
}

#[test]
fn test_malformed_metadata_names_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("bad.json"), "{ not json").unwrap();

    let err = load_metadata_dir(temp_dir.path()).unwrap_err();
    assert!(err.to_string().contains("bad.json"));
}

#[tokio::test]
async fn test_downloads_only_missing_files() {
    let temp_dir = TempDir::new().unwrap();
    let json_dir = temp_dir.path().join("json");
    let data_dir = temp_dir.path().join("models");
    fs::create_dir_all(&json_dir).unwrap();
    fs::create_dir_all(&data_dir).unwrap();
    write_metadata(&json_dir);
    fs::write(data_dir.join("alq-v13-fgnet-fp16-256x352-1x-ox.tz"), b"kept").unwrap();

    let records = load_metadata_dir(&json_dir).unwrap();
    let models: Vec<_> = ModelResolver::new("onnx", None)
        .resolve_all(&records)
        .collect();
    let files = backend_files(&models, &IncludeFilter::default());
    let tasks: Vec<_> = missing(&files, &data_dir)
        .into_iter()
        .map(|path| DownloadTask::new(PREFIX, path))
        .collect();
    assert_eq!(tasks.len(), 3);
    assert_eq!(
        tasks[0].source_url,
        format!("{PREFIX}alq-v13-fgnet-fp16-480x640-1x-ox.tz")
    );

    let transport = Arc::new(MockTransport::new());
    let engine = FetchEngine::new(transport.clone(), RetryPolicy::default());
    let report = engine
        .run(tasks, 2, &mut |_: &ProgressEvent<'_>| {})
        .await;

    assert!(report.is_success());
    assert_eq!(report.completed.len(), 3);
    assert!(transport
        .calls_for("alq-v13-fgnet-fp16-256x352-1x-ox.tz")
        .is_empty());
    assert_eq!(
        fs::read(data_dir.join("alq-v13-fgnet-fp16-256x352-1x-ox.tz")).unwrap(),
        b"kept"
    );
    assert!(missing(&files, &data_dir).is_empty());
}
