use remora_core::{CoreError, DispatchOptions, Dispatcher, ImageBuilder, RegisteredFunction};
use remora_runtime::{LocalRuntime, MockBackend, MockRuntime, PayloadError};
use remora_schema::{get_preset, parse_manifest_str, ImageSpec, ManifestError};
use std::sync::Arc;
use std::time::Duration;

fn mock_stack() -> (Arc<MockBackend>, Arc<MockRuntime>, Dispatcher) {
    let backend = Arc::new(MockBackend::new());
    let runtime = Arc::new(MockRuntime::new());
    let dispatcher = Dispatcher::new(ImageBuilder::new(backend.clone()), runtime.clone());
    (backend, runtime, dispatcher)
}

#[test]
fn build_twice_second_call_performs_zero_steps() {
    let (backend, _runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::new("debian-slim", ["install-pkg-A", "install-pkg-B"]).unwrap();

    let h1 = dispatcher.builder().build_or_reuse(&spec).unwrap();
    assert_eq!(backend.steps_run(), 2);

    let h2 = dispatcher.builder().build_or_reuse(&spec).unwrap();
    assert_eq!(h1, h2, "second build must return the same handle");
    assert_eq!(backend.steps_run(), 2, "second build must run zero steps");
}

#[test]
fn hello_payload_roundtrip_with_teardown() {
    let (_backend, runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::from_base("debian-slim").unwrap();
    let f = RegisteredFunction::register_fn(spec, |arg| {
        assert_eq!(arg, "x");
        Ok(b"hello".to_vec())
    });

    let session = dispatcher.session().unwrap();
    let out = session.invoke(&f, "x").unwrap();
    assert_eq!(out, b"hello");
    assert_eq!(runtime.provisioned(), 1);
    assert_eq!(runtime.torn_down(), 1, "sandbox must be torn down after use");
}

#[test]
fn raising_payload_reports_failure_and_tears_down() {
    let (_backend, runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::from_base("debian-slim").unwrap();
    let f = RegisteredFunction::register_fn(spec, |arg| {
        Err(PayloadError::new(format!("cannot handle '{arg}'")))
    });

    let session = dispatcher.session().unwrap();
    let err = session.invoke(&f, "bad").unwrap_err();
    assert!(matches!(err, CoreError::PayloadExecutionFailed(ref m) if m.contains("bad")));
    assert_eq!(runtime.provisioned(), runtime.torn_down());
}

#[test]
fn empty_base_fails_before_any_builder_call() {
    let err = ImageSpec::new("", ["install-pkg-A"]).unwrap_err();
    assert!(matches!(err, ManifestError::EmptyBaseImage));
}

#[test]
fn failing_step_leaves_no_cache_entry() {
    let (_backend, _runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::new("debian-slim", ["ok", "ok", "fail:repo unreachable"]).unwrap();

    let err = dispatcher.builder().build_or_reuse(&spec).unwrap_err();
    match err {
        CoreError::BuildStepFailed { step_index, source } => {
            assert_eq!(step_index, 2);
            assert!(source.to_string().contains("repo unreachable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dispatcher.builder().is_cached(&spec));
}

#[test]
fn invoke_without_session_never_provisions() {
    let (_backend, runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::from_base("debian-slim").unwrap();
    let f = RegisteredFunction::register_fn(spec, |_| Ok(Vec::new()));

    for _ in 0..3 {
        assert!(matches!(
            dispatcher.invoke(&f, "x"),
            Err(CoreError::NoActiveSession)
        ));
    }
    assert_eq!(runtime.provisioned(), 0);
}

#[test]
fn preset_manifest_builds_and_dispatches() {
    let (backend, _runtime, dispatcher) = mock_stack();
    let preset = get_preset("headless-chromium").unwrap();
    let manifest = parse_manifest_str(preset.manifest).unwrap();
    let f = RegisteredFunction::register_manifest(
        &manifest,
        remora_runtime::payload(|url| Ok(format!("png-bytes-for:{url}").into_bytes())),
    )
    .unwrap();

    let session = dispatcher.session().unwrap();
    let out = session.invoke(&f, "https://example.com").unwrap();
    assert_eq!(out, b"png-bytes-for:https://example.com");
    assert_eq!(backend.steps_run(), f.spec().steps().len());
}

#[test]
fn sequential_invokes_one_sandbox_each() {
    let (_backend, runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::from_base("debian-slim").unwrap();
    let f = RegisteredFunction::register_fn(spec, |arg| Ok(arg.as_bytes().to_vec()));

    let session = dispatcher.session().unwrap();
    for arg in ["a", "b", "c"] {
        assert_eq!(session.invoke(&f, arg).unwrap(), arg.as_bytes());
    }
    assert_eq!(runtime.provisioned(), 3);
    assert_eq!(runtime.torn_down(), 3);
    assert_eq!(runtime.live_count(), 0);
}

#[test]
fn timeout_extension_end_to_end() {
    let (_backend, runtime, dispatcher) = mock_stack();
    let spec = ImageSpec::from_base("debian-slim").unwrap();
    let f = RegisteredFunction::register_fn(spec, |_| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(b"late".to_vec())
    });

    let session = dispatcher.session().unwrap();
    let err = session
        .invoke_with(&f, "x", DispatchOptions::with_timeout(Duration::from_millis(30)))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvocationTimeout(_)));
    assert_eq!(runtime.torn_down(), runtime.provisioned());
}

// Full stack over the real shell backend and local runtime: build steps touch
// the filesystem, sandboxes get real working directories.
#[test]
fn shell_build_and_local_dispatch() {
    let store = tempfile::tempdir().unwrap();
    let store_str = store.path().to_string_lossy().into_owned();

    let builder = ImageBuilder::with_backend_name("shell", &store_str).unwrap();
    let runtime = Arc::new(LocalRuntime::with_store_root(store.path()));
    let dispatcher = Dispatcher::new(builder, runtime.clone());

    let spec = ImageSpec::new(
        "debian-slim",
        ["echo base-ready > provisioned.txt", "test -f provisioned.txt"],
    )
    .unwrap();
    let f = RegisteredFunction::register_fn(spec.clone(), |arg| {
        Ok(format!("fetched {arg}").into_bytes())
    });

    let session = dispatcher.session().unwrap();
    let out = session.invoke(&f, "https://example.com").unwrap();
    assert_eq!(out, b"fetched https://example.com");
    assert!(dispatcher.builder().is_cached(&spec));
    assert_eq!(runtime.live_count(), 0, "local sandbox must be torn down");
}

#[test]
fn shell_build_failure_propagates_step_index() {
    let store = tempfile::tempdir().unwrap();
    let store_str = store.path().to_string_lossy().into_owned();

    let builder = ImageBuilder::with_backend_name("shell", &store_str).unwrap();
    let runtime = Arc::new(LocalRuntime::with_store_root(store.path()));
    let dispatcher = Dispatcher::new(builder, runtime);

    let spec = ImageSpec::new("debian-slim", ["true", "exit 7"]).unwrap();
    let err = dispatcher.builder().build_or_reuse(&spec).unwrap_err();
    assert!(matches!(err, CoreError::BuildStepFailed { step_index: 1, .. }));
    assert!(!dispatcher.builder().is_cached(&spec));
}
