// Process-level tests: the editor side loading the real plugin binary.
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use wi_core::plugin::Loader;
use wi_core::{
    Candidate, EventRegistry, PluginError, PluginHost, PluginProcess, PluginStatus, PluginsConfig,
    Supervisor,
};

fn plugin_exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wi-plugin-sample"))
}

fn config() -> PluginsConfig {
    PluginsConfig {
        handshake_timeout_ms: 10_000,
        info_timeout_ms: 10_000,
        quit_timeout_ms: 2_000,
        ..PluginsConfig::default()
    }
}

async fn wait_for(plugin: &PluginProcess, status: PluginStatus) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while plugin.status() != status {
        assert!(
            Instant::now() < deadline,
            "{plugin} stuck in {} waiting for {status}",
            plugin.status()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_load_init_close() {
    let events = EventRegistry::new();
    let posted = Arc::new(Mutex::new(Vec::new()));
    let seen = posted.clone();
    events.register_commands(move |lines| seen.lock().extend(lines.clone()));

    let (supervisor, faults) = Supervisor::new();
    let loader = Loader::new(&config(), "fr", events.clone(), supervisor.clone());
    let plugin = loader
        .load(Candidate::Executable(plugin_exe()))
        .await
        .unwrap();
    assert_eq!(plugin.details().name, "wi-plugin-sample");
    assert_eq!(plugin.details().version, env!("CARGO_PKG_VERSION"));
    assert_eq!(plugin.status(), PluginStatus::Loaded);

    plugin.start_init(
        wi_core::EditorDetails {
            id: "wi".to_string(),
            version: "test".to_string(),
        },
        &supervisor,
    );
    wait_for(&plugin, PluginStatus::Ready).await;
    assert!(plugin.is_initialized());

    // The binding request posted during Init reaches the local bus.
    let deadline = Instant::now() + Duration::from_secs(5);
    while posted.lock().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(
        posted.lock().first().map(|line| line.join(" ")),
        Some("key_bind Ctrl-t alert Bonjour from wi-plugin-sample".to_string())
    );

    // Host events are forwarded while the plugin is live.
    events.trigger_editor_language(&"en".to_string());

    plugin.close().await.unwrap();
    assert_eq!(plugin.status(), PluginStatus::Closed);
    // Closing twice is a no-op.
    plugin.close().await.unwrap();
    assert_eq!(events.listener_count(wi_core::EventKind::EditorLanguage), 0);
    assert!(faults.try_recv().is_err());
}

#[test]
fn test_refuses_to_run_standalone() {
    let output = std::process::Command::new(plugin_exe())
        .env_remove("WI")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must be started by the wi editor"), "{stderr}");
}

#[cfg(unix)]
fn script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_partial_failure_keeps_good_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let old = script(dir.path(), "wi-plugin-old", "printf 'not-the-right-token'");
    let noisy = script(dir.path(), "wi-plugin-noisy", "echo 'missing library' >&2; sleep 5");

    let (supervisor, _faults) = Supervisor::new();
    let host = PluginHost::new(config(), "en", EventRegistry::new(), supervisor);
    let err = host
        .load_candidates(vec![
            Candidate::Executable(plugin_exe()),
            Candidate::Executable(old),
            Candidate::Executable(plugin_exe()),
            Candidate::Executable(noisy),
        ])
        .await
        .unwrap_err();

    match &err {
        PluginError::Load { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().any(|f| matches!(f, PluginError::VersionMismatch { .. })));
            assert!(failures.iter().any(|f| matches!(f, PluginError::Stderr { .. })));
        }
        other => panic!("unexpected {other}"),
    }
    let text = err.to_string();
    assert!(text.contains("wi-plugin-old") && text.contains("wi-plugin-noisy"), "{text}");

    let details = host.details().await;
    assert_eq!(details.len(), 2);
    assert!(details.iter().all(|(d, _)| d.name == "wi-plugin-sample"));

    host.close().await.unwrap();
    assert!(host.details().await.is_empty());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_dead_plugin_is_quarantined() {
    let events = EventRegistry::new();
    let (supervisor, _faults) = Supervisor::new();
    let loader = Loader::new(&config(), "en", events.clone(), supervisor);
    let plugin = loader
        .load(Candidate::Executable(plugin_exe()))
        .await
        .unwrap();
    let pid = plugin.pid().unwrap();

    let status = tokio::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .await
        .unwrap();
    assert!(status.success());

    wait_for(&plugin, PluginStatus::Quarantined).await;
    assert!(plugin.error().is_some());
    // No longer forwarded to.
    assert_eq!(events.listener_count(wi_core::EventKind::WindowCreated), 0);

    // Quit can't reach a dead process; the rest of shutdown still runs.
    let err = plugin.close().await.unwrap_err();
    assert!(matches!(err, PluginError::Rpc(wi_core::RpcError::Closed)), "{err}");
    assert_eq!(plugin.status(), PluginStatus::Closed);
    plugin.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plugins_loaded_after_close_are_closed() {
    let events = EventRegistry::new();
    let (supervisor, _faults) = Supervisor::new();
    let host = PluginHost::new(config(), "en", events.clone(), supervisor);
    host.close().await.unwrap();

    // Loading finished after the editor shut down.
    let count = host
        .load_candidates(vec![Candidate::Executable(plugin_exe())])
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(host.details().await.is_empty());
    assert_eq!(events.listener_count(wi_core::EventKind::EditorLanguage), 0);
}
