// wi-core/src/plugin.rs
//! Out-of-process plugins: discovery, launch, version handshake, lifecycle.

use parking_lot::Mutex;
use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::PluginsConfig;
use crate::event::{EventError, EventRegistry, Subscription};
use crate::rpc::{
    EditorDetails, INTERFACE_FINGERPRINT, PLUGIN_ENV, PLUGIN_ENV_VALUE, PluginDetails, RemoteEvent,
    RpcChannels, RpcClient, RpcError, TOKEN_LEN,
};
use crate::supervisor::Supervisor;

/// File and directory names a plugin must start with.
pub const PLUGIN_PREFIX: &str = "wi-plugin-";

/// Extra plugin directories, in the OS path list format.
pub const PLUGINS_PATH_ENV: &str = "WIPLUGINSPATH";

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("{}: unexpected version; expected {expected:?}, got {got:?}", .path.display())]
    VersionMismatch {
        path: PathBuf,
        expected: String,
        got: String,
    },
    #[error("{}: wrote to stderr while starting: {output}", .path.display())]
    Stderr { path: PathBuf, output: String },
    #[error("{}: no answer to {stage} within {timeout:?}", .path.display())]
    Timeout {
        path: PathBuf,
        stage: &'static str,
        timeout: Duration,
    },
    #[error("{}: failed to build: {output}", .path.display())]
    Build { path: PathBuf, output: String },
    #[error("{}: {source}", .path.display())]
    Launch { path: PathBuf, source: Box<PluginError> },
    #[error("{}: loader task died", .path.display())]
    Crashed { path: PathBuf },
    #[error("{} plugin(s) failed to load: {}", .failures.len(), summarize(.failures))]
    Load { failures: Vec<PluginError> },
}

fn summarize(failures: &[PluginError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Discovered,
    Spawned,
    VersionChecked,
    Loaded,
    Initializing,
    Ready,
    Quarantined,
    Closed,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something in a search directory that looks like a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Ready to run
    Executable(PathBuf),
    /// A single `.rs` file, compiled with rustc first
    Source(PathBuf),
    /// A cargo package, built first
    Crate(PathBuf),
}

impl Candidate {
    pub fn path(&self) -> &Path {
        match self {
            Candidate::Executable(p) | Candidate::Source(p) | Candidate::Crate(p) => p,
        }
    }
}

/// Built-in search directories followed by configured and environment ones,
/// keeping only readable directories.
pub fn search_dirs(config: &PluginsConfig) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd);
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".wi").join("plugins"));
    }
    candidates.extend(config.search_paths.iter().cloned());
    if let Some(extra) = env::var_os(PLUGINS_PATH_ENV) {
        candidates.extend(env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }
    validate_dirs(candidates)
}

/// Resolve each entry to an absolute readable directory. Bad entries are
/// logged and dropped, duplicates removed.
pub fn validate_dirs(candidates: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for dir in candidates {
        let abs = match dir.canonicalize() {
            Ok(abs) => abs,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "skipping plugin search path");
                continue;
            }
        };
        if !abs.is_dir() {
            warn!(path = %abs.display(), "skipping plugin search path, not a directory");
            continue;
        }
        if let Err(e) = std::fs::read_dir(&abs) {
            warn!(path = %abs.display(), error = %e, "skipping unreadable plugin search path");
            continue;
        }
        if !out.contains(&abs) {
            out.push(abs);
        }
    }
    debug!(?out, "plugin search paths");
    out
}

/// Entries named `wi-plugin-*` in `dirs`, sorted per directory.
pub fn find_candidates(dirs: &[PathBuf]) -> Vec<Candidate> {
    let mut out = Vec::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "can't list plugin directory");
                continue;
            }
        };
        let mut found: Vec<Candidate> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(PLUGIN_PREFIX))
            .filter_map(|e| classify(&e.path()))
            .collect();
        found.sort_by(|a, b| a.path().cmp(b.path()));
        out.extend(found);
    }
    out
}

fn classify(path: &Path) -> Option<Candidate> {
    if path.is_dir() {
        return path
            .join("Cargo.toml")
            .is_file()
            .then(|| Candidate::Crate(path.to_path_buf()));
    }
    if path.extension().is_some_and(|ext| ext == "rs") {
        return Some(Candidate::Source(path.to_path_buf()));
    }
    is_executable(path).then(|| Candidate::Executable(path.to_path_buf()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "exe")
}

#[derive(Default)]
struct PluginState {
    status: Option<PluginStatus>,
    error: Option<String>,
    subscription: Option<Subscription>,
}

/// A live plugin process.
pub struct PluginProcess {
    path: PathBuf,
    pid: Option<u32>,
    details: PluginDetails,
    client: Arc<RpcClient>,
    child: tokio::sync::Mutex<Option<Child>>,
    state: Mutex<PluginState>,
    quit_timeout: Duration,
}

impl fmt::Debug for PluginProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginProcess")
            .field("name", &self.details.name)
            .field("pid", &self.pid)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for PluginProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "Plugin({}, {})", self.details.name, pid),
            None => write!(f, "Plugin({})", self.details.name),
        }
    }
}

impl PluginProcess {
    pub fn details(&self) -> &PluginDetails {
        &self.details
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> PluginStatus {
        self.state.lock().status.unwrap_or(PluginStatus::Loaded)
    }

    pub fn is_initialized(&self) -> bool {
        self.status() == PluginStatus::Ready
    }

    /// Why the plugin was quarantined, if it was.
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    fn set_status(&self, status: PluginStatus) {
        self.state.lock().status = Some(status);
    }

    /// Forward editor events to the plugin until quarantine or close.
    fn subscribe(&self, events: &EventRegistry) {
        let mut sub = events.subscription();
        let c = self.client.clone();
        sub.push(events.register_editor_language(move |lang| {
            let _ = c.notify(RemoteEvent::EditorLanguage(lang.clone()));
        }));
        let c = self.client.clone();
        sub.push(events.register_terminal_resized(move |size| {
            let _ = c.notify(RemoteEvent::TerminalResized {
                width: size.width,
                height: size.height,
            });
        }));
        let c = self.client.clone();
        sub.push(events.register_window_created(move |w| {
            let _ = c.notify(RemoteEvent::WindowCreated { window: w.to_string() });
        }));
        let c = self.client.clone();
        sub.push(events.register_window_closed(move |w| {
            let _ = c.notify(RemoteEvent::WindowClosed { window: w.to_string() });
        }));
        let c = self.client.clone();
        sub.push(events.register_window_resized(move |w| {
            let _ = c.notify(RemoteEvent::WindowResized { window: w.to_string() });
        }));
        let c = self.client.clone();
        sub.push(events.register_view_activated(move |w| {
            let _ = c.notify(RemoteEvent::ViewActivated { window: w.to_string() });
        }));
        self.state.lock().subscription = Some(sub);
    }

    /// Send `Init` without waiting. A background task marks the plugin ready
    /// or quarantines it.
    /// Only a plugin still in `Loaded` is initialized.
    pub fn start_init(self: &Arc<Self>, editor: EditorDetails, supervisor: &Supervisor) {
        {
            let mut state = self.state.lock();
            if state.status != Some(PluginStatus::Loaded) {
                debug!(plugin = %self, status = ?state.status, "not initializing");
                return;
            }
            state.status = Some(PluginStatus::Initializing);
        }
        let pending = match self.client.init(editor) {
            Ok(pending) => pending,
            Err(err) => {
                self.quarantine(&err);
                return;
            }
        };
        let plugin = self.clone();
        supervisor.spawn(format!("{}-init", self.details.name), async move {
            match pending.await {
                Ok(Ok(_)) => {
                    let mut state = plugin.state.lock();
                    if state.status == Some(PluginStatus::Initializing) {
                        state.status = Some(PluginStatus::Ready);
                        drop(state);
                        info!(plugin = %plugin, "initialized");
                    }
                }
                Ok(Err(err)) => plugin.quarantine(&err),
                Err(_) => plugin.quarantine(&RpcError::Closed),
            }
        });
    }

    /// Mark the plugin failed and stop forwarding events to it. The process
    /// stays alive until shutdown.
    pub fn quarantine(&self, err: &dyn fmt::Display) {
        let sub = {
            let mut state = self.state.lock();
            if matches!(
                state.status,
                Some(PluginStatus::Quarantined | PluginStatus::Closed)
            ) {
                return;
            }
            state.status = Some(PluginStatus::Quarantined);
            state.error = Some(err.to_string());
            state.subscription.take()
        };
        error!(plugin = %self, error = %err, "plugin quarantined");
        if let Some(sub) = sub {
            let _ = sub.cancel();
        }
    }

    /// Unsubscribe, ask the plugin to quit, close the transport, kill the
    /// process. Every step runs; the first error is returned. Calling it
    /// again does nothing.
    pub async fn close(&self) -> Result<(), PluginError> {
        let sub = {
            let mut state = self.state.lock();
            if state.status == Some(PluginStatus::Closed) {
                return Ok(());
            }
            state.status = Some(PluginStatus::Closed);
            state.subscription.take()
        };
        let mut first: Option<PluginError> = None;

        if let Some(sub) = sub {
            if let Err(e) = sub.cancel() {
                first.get_or_insert(e.into());
            }
        }

        // A dead transport fails this right away.
        match timeout(self.quit_timeout, self.client.quit(0)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                first.get_or_insert(e.into());
            }
            Err(_) => warn!(plugin = %self, timeout = ?self.quit_timeout, "quit timed out"),
        }

        self.client.close();

        if let Some(mut child) = self.child.lock().await.take() {
            let exited = matches!(
                timeout(Duration::from_millis(100), child.wait()).await,
                Ok(Ok(_))
            );
            if !exited {
                if let Err(e) = child.kill().await {
                    first.get_or_insert(e.into());
                }
            }
        }

        info!(plugin = %self, "closed");
        first.map_or(Ok(()), Err)
    }
}

/// Everything a launch needs, cheap to clone into each loader task.
#[derive(Clone)]
pub struct Loader {
    pub language: String,
    pub handshake_timeout: Duration,
    pub info_timeout: Duration,
    pub quit_timeout: Duration,
    pub scratch_dir: PathBuf,
    pub events: EventRegistry,
    pub supervisor: Supervisor,
}

impl Loader {
    pub fn new(config: &PluginsConfig, language: &str, events: EventRegistry, supervisor: Supervisor) -> Self {
        Self {
            language: language.to_string(),
            handshake_timeout: config.handshake_timeout(),
            info_timeout: config.info_timeout(),
            quit_timeout: config.quit_timeout(),
            scratch_dir: env::temp_dir().join("wi-plugins"),
            events,
            supervisor,
        }
    }

    /// Launch every candidate concurrently. Returns once each attempt has
    /// ended, with the plugins that made it and one error covering the rest.
    pub async fn load_all(
        &self,
        candidates: Vec<Candidate>,
    ) -> (Vec<Arc<PluginProcess>>, Result<(), PluginError>) {
        let attempts: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let (tx, rx) = oneshot::channel();
                let path = candidate.path().to_path_buf();
                let loader = self.clone();
                self.supervisor
                    .spawn(format!("load {}", path.display()), async move {
                        let _ = tx.send(loader.load(candidate).await);
                    });
                (path, rx)
            })
            .collect();

        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for (path, rx) in attempts {
            match rx.await {
                Ok(Ok(plugin)) => loaded.push(plugin),
                Ok(Err(e)) => {
                    warn!(path = %path.display(), error = %e, "plugin failed to load");
                    failures.push(e);
                }
                Err(_) => failures.push(PluginError::Crashed { path }),
            }
        }
        let result = if failures.is_empty() {
            Ok(())
        } else {
            Err(PluginError::Load { failures })
        };
        (loaded, result)
    }

    /// Build if needed, spawn, check the version token and fetch details.
    pub async fn load(&self, candidate: Candidate) -> Result<Arc<PluginProcess>, PluginError> {
        let path = candidate.path().to_path_buf();
        debug!(path = %path.display(), status = %PluginStatus::Discovered, "loading plugin");
        let exe = self
            .build(&candidate)
            .await
            .map_err(|e| wrap(&path, e))?;

        let mut child = Command::new(&exe)
            .env(PLUGIN_ENV, PLUGIN_ENV_VALUE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| wrap(&path, e.into()))?;
        let pid = child.id();
        debug!(path = %path.display(), ?pid, status = %PluginStatus::Spawned, "plugin spawned");

        match self.connect(&path, &mut child).await {
            Ok((client, channels, details)) => {
                let plugin = Arc::new(PluginProcess {
                    path,
                    pid,
                    details,
                    client: Arc::new(client),
                    child: tokio::sync::Mutex::new(Some(child)),
                    state: Mutex::new(PluginState {
                        status: Some(PluginStatus::Loaded),
                        ..PluginState::default()
                    }),
                    quit_timeout: self.quit_timeout,
                });
                plugin.subscribe(&self.events);
                self.watch(&plugin, channels);
                info!(plugin = %plugin, version = %plugin.details.version, "plugin loaded");
                Ok(plugin)
            }
            Err(e) => {
                let _ = child.kill().await;
                Err(wrap(&path, e))
            }
        }
    }

    async fn connect(
        &self,
        path: &Path,
        child: &mut Child,
    ) -> Result<(RpcClient, RpcChannels, PluginDetails), PluginError> {
        let (Some(stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(io::Error::other("missing plugin pipes").into());
        };

        let token = timeout(
            self.handshake_timeout,
            handshake(path, &mut stdout, &mut stderr),
        )
        .await
        .map_err(|_| PluginError::Timeout {
            path: path.to_path_buf(),
            stage: "handshake",
            timeout: self.handshake_timeout,
        })??;
        if token != INTERFACE_FINGERPRINT.as_bytes() {
            return Err(PluginError::VersionMismatch {
                path: path.to_path_buf(),
                expected: INTERFACE_FINGERPRINT.to_string(),
                got: String::from_utf8_lossy(&token).into_owned(),
            });
        }
        debug!(path = %path.display(), status = %PluginStatus::VersionChecked, "version token accepted");

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plugin".to_string());
        self.supervisor
            .spawn(format!("{name}-stderr"), drain_stderr(name.clone(), stderr));

        let (client, channels) = RpcClient::start(&name, stdout, stdin, &self.supervisor);
        let details = timeout(self.info_timeout, client.get_info(&self.language))
            .await
            .map_err(|_| PluginError::Timeout {
                path: path.to_path_buf(),
                stage: "GetInfo",
                timeout: self.info_timeout,
            })??;
        Ok((client, channels, details))
    }

    // Incoming notifications go to the local bus; a dead transport
    // quarantines the plugin.
    fn watch(&self, plugin: &Arc<PluginProcess>, channels: RpcChannels) {
        let RpcChannels {
            mut events,
            failure,
        } = channels;

        let bus = self.events.clone();
        let p = plugin.clone();
        self.supervisor
            .spawn(format!("{}-events", plugin.details.name), async move {
                while let Some(event) = events.recv().await {
                    if matches!(p.status(), PluginStatus::Quarantined | PluginStatus::Closed) {
                        continue;
                    }
                    match event {
                        RemoteEvent::Commands(commands) => bus.trigger_commands(&commands),
                        other => debug!(plugin = %p, ?other, "ignoring event from plugin"),
                    }
                }
            });

        let p = plugin.clone();
        self.supervisor
            .spawn(format!("{}-failure", plugin.details.name), async move {
                if let Ok(err) = failure.await {
                    p.quarantine(&err);
                }
            });
    }

    async fn build(&self, candidate: &Candidate) -> Result<PathBuf, PluginError> {
        match candidate {
            Candidate::Executable(path) => Ok(path.clone()),
            Candidate::Source(path) => {
                tokio::fs::create_dir_all(&self.scratch_dir).await?;
                let stem = path.file_stem().unwrap_or_default();
                let exe = self
                    .scratch_dir
                    .join(stem)
                    .with_extension(env::consts::EXE_EXTENSION);
                let mut rustc = Command::new("rustc");
                rustc
                    .args(["--edition", "2024", "-O", "-o"])
                    .arg(&exe)
                    .arg(path);
                run_build(path, rustc).await?;
                Ok(exe)
            }
            Candidate::Crate(path) => {
                let target = self.scratch_dir.join("target");
                let mut cargo = Command::new("cargo");
                cargo
                    .args(["build", "--release", "--quiet", "--manifest-path"])
                    .arg(path.join("Cargo.toml"))
                    .arg("--target-dir")
                    .arg(&target);
                run_build(path, cargo).await?;
                let name = path.file_name().unwrap_or_default();
                Ok(target
                    .join("release")
                    .join(name)
                    .with_extension(env::consts::EXE_EXTENSION))
            }
        }
    }
}

fn wrap(path: &Path, err: PluginError) -> PluginError {
    match err {
        // These already name the plugin.
        PluginError::VersionMismatch { .. }
        | PluginError::Stderr { .. }
        | PluginError::Timeout { .. }
        | PluginError::Build { .. } => err,
        other => PluginError::Launch {
            path: path.to_path_buf(),
            source: Box::new(other),
        },
    }
}

async fn run_build(path: &Path, mut command: Command) -> Result<(), PluginError> {
    info!(path = %path.display(), "building plugin, this is slow");
    let output = command.output().await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(PluginError::Build {
            path: path.to_path_buf(),
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Read the version token. Any stderr output before it arrives fails the
/// launch.
async fn handshake<O, E>(path: &Path, stdout: &mut O, stderr: &mut E) -> Result<Vec<u8>, PluginError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut token = vec![0u8; TOKEN_LEN];
    let mut filled = 0;
    let mut err_buf = [0u8; 2048];
    let mut stderr_open = true;

    while filled < TOKEN_LEN {
        tokio::select! {
            n = stdout.read(&mut token[filled..]) => {
                match n? {
                    0 => break,
                    n => filled += n,
                }
            }
            n = stderr.read(&mut err_buf), if stderr_open => {
                match n {
                    Ok(0) | Err(_) => stderr_open = false,
                    Ok(n) => {
                        return Err(PluginError::Stderr {
                            path: path.to_path_buf(),
                            output: String::from_utf8_lossy(&err_buf[..n]).trim().to_string(),
                        });
                    }
                }
            }
        }
    }
    token.truncate(filled);
    Ok(token)
}

async fn drain_stderr(name: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(plugin = %name, "{line}");
    }
}

/// Owns the loaded plugins for the editor's lifetime.
pub struct PluginHost {
    loader: Loader,
    config: PluginsConfig,
    plugins: tokio::sync::Mutex<HostPlugins>,
}

#[derive(Default)]
struct HostPlugins {
    live: Vec<Arc<PluginProcess>>,
    // Set by close; plugins that finish loading afterwards are closed at once.
    closed: bool,
}

impl PluginHost {
    pub fn new(config: PluginsConfig, language: &str, events: EventRegistry, supervisor: Supervisor) -> Self {
        Self {
            loader: Loader::new(&config, language, events, supervisor),
            config,
            plugins: tokio::sync::Mutex::new(HostPlugins::default()),
        }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Discover and load every plugin, then start their initialization.
    /// Returns how many loaded; failures are aggregated into the error but
    /// the plugins that did load are kept either way.
    pub async fn load(&self) -> Result<usize, PluginError> {
        if !self.config.enabled {
            info!("plugins disabled");
            return Ok(0);
        }
        let candidates = find_candidates(&search_dirs(&self.config));
        self.load_candidates(candidates).await
    }

    pub async fn load_candidates(&self, candidates: Vec<Candidate>) -> Result<usize, PluginError> {
        let (loaded, result) = self.loader.load_all(candidates).await;
        let count = loaded.len();
        let editor = EditorDetails {
            id: "wi".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let mut plugins = self.plugins.lock().await;
        if plugins.closed {
            drop(plugins);
            info!(count, "host already closed, closing late plugins");
            for plugin in &loaded {
                if let Err(e) = plugin.close().await {
                    warn!(plugin = %plugin, error = %e, "error while closing plugin");
                }
            }
            return result.map(|_| 0);
        }
        for plugin in &loaded {
            plugin.start_init(editor.clone(), &self.loader.supervisor);
        }
        plugins.live.extend(loaded);
        result.map(|_| count)
    }

    pub async fn details(&self) -> Vec<(PluginDetails, PluginStatus)> {
        self.plugins
            .lock()
            .await
            .live
            .iter()
            .map(|p| (p.details().clone(), p.status()))
            .collect()
    }

    pub async fn plugins(&self) -> Vec<Arc<PluginProcess>> {
        self.plugins.lock().await.live.clone()
    }

    /// Close every plugin concurrently. Returns the first error. Plugins
    /// still loading are closed as soon as they finish.
    pub async fn close(&self) -> Result<(), PluginError> {
        let plugins: Vec<_> = {
            let mut plugins = self.plugins.lock().await;
            plugins.closed = true;
            plugins.live.drain(..).collect()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        for plugin in plugins {
            let tx = tx.clone();
            self.loader
                .supervisor
                .spawn(format!("close {}", plugin.details.name), async move {
                    let _ = tx.send(plugin.close().await);
                });
        }
        drop(tx);
        let mut first = None;
        while let Some(result) = rx.recv().await {
            if let Err(e) = result {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginsConfig;
    use crate::event::EventKind;
    use crate::rpc::{Host, PluginHandler, serve};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;
    use tokio::io::{DuplexStream, duplex};

    #[test]
    fn test_validate_dirs_skips_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let dirs = validate_dirs(vec![
            dir.path().to_path_buf(),
            file,
            dir.path().join("missing"),
            dir.path().join(".").join(""),
        ]);
        assert_eq!(dirs, vec![dir.path().canonicalize().unwrap()]);
    }

    #[test]
    fn test_search_dirs_include_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = PluginsConfig {
            search_paths: vec![dir.path().to_path_buf(), dir.path().join("nope")],
            ..PluginsConfig::default()
        };
        let dirs = search_dirs(&config);
        assert!(dirs.contains(&dir.path().canonicalize().unwrap()));
        assert!(dirs.iter().all(|d| d.is_absolute()));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_find_candidates_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "wi-plugin-exec", "true");
        script(dir.path(), "other-tool", "true");
        std::fs::write(dir.path().join("wi-plugin-src.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("wi-plugin-data.txt"), "not executable").unwrap();
        std::fs::create_dir(dir.path().join("wi-plugin-crate")).unwrap();
        std::fs::write(dir.path().join("wi-plugin-crate/Cargo.toml"), "").unwrap();
        std::fs::create_dir(dir.path().join("wi-plugin-empty")).unwrap();

        let base = dir.path().to_path_buf();
        let found = find_candidates(std::slice::from_ref(&base));
        assert_eq!(
            found,
            vec![
                Candidate::Crate(base.join("wi-plugin-crate")),
                Candidate::Executable(base.join("wi-plugin-exec")),
                Candidate::Source(base.join("wi-plugin-src.rs")),
            ]
        );
    }

    fn loader() -> (Loader, crossbeam::channel::Receiver<crate::supervisor::Fault>) {
        let (supervisor, faults) = Supervisor::new();
        let config = PluginsConfig {
            handshake_timeout_ms: 2000,
            info_timeout_ms: 300,
            quit_timeout_ms: 200,
            ..PluginsConfig::default()
        };
        (Loader::new(&config, "en", EventRegistry::new(), supervisor), faults)
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_wrong_token_names_both_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let bad = script(dir.path(), "wi-plugin-old", "printf 'deadbeef'");
        let (loader, _faults) = loader();

        let err = loader.load(Candidate::Executable(bad)).await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, PluginError::VersionMismatch { .. }));
        assert!(text.contains(INTERFACE_FINGERPRINT), "{text}");
        assert!(text.contains("deadbeef"), "{text}");
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_stderr_before_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let noisy = script(dir.path(), "wi-plugin-noisy", "echo oops >&2; sleep 5");
        let (loader, _faults) = loader();

        let err = loader.load(Candidate::Executable(noisy)).await.unwrap_err();
        assert!(matches!(err, PluginError::Stderr { ref output, .. } if output == "oops"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_silent_plugin_times_out_on_get_info() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("printf '{INTERFACE_FINGERPRINT}'; sleep 5");
        let mute = script(dir.path(), "wi-plugin-mute", &body);
        let (loader, _faults) = loader();

        let err = loader.load(Candidate::Executable(mute)).await.unwrap_err();
        assert!(
            matches!(err, PluginError::Timeout { stage: "GetInfo", .. }),
            "{err}"
        );
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_failures_are_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let a = script(dir.path(), "wi-plugin-a", "printf 'short'");
        let b = script(dir.path(), "wi-plugin-b", "echo broken >&2");
        let (loader, _faults) = loader();

        let (loaded, result) = loader
            .load_all(vec![Candidate::Executable(a), Candidate::Executable(b)])
            .await;
        assert!(loaded.is_empty());
        let err = result.unwrap_err();
        match &err {
            PluginError::Load { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected {other}"),
        }
        let text = err.to_string();
        assert!(text.starts_with("2 plugin(s) failed to load"), "{text}");
        assert!(text.contains("wi-plugin-a") && text.contains("wi-plugin-b"), "{text}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_broken_source_fails_to_build() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("wi-plugin-broken.rs");
        std::fs::write(&source, "fn main() { let }").unwrap();
        let (mut loader, _faults) = loader();
        loader.scratch_dir = dir.path().join("scratch");

        let err = loader.load(Candidate::Source(source)).await.unwrap_err();
        assert!(matches!(err, PluginError::Build { .. }), "{err}");
        assert!(err.to_string().contains("wi-plugin-broken.rs"), "{err}");
        assert!(loader.scratch_dir.is_dir());
    }

    #[tokio::test]
    async fn test_nothing_to_load() {
        let (loader, _faults) = loader();
        let (loaded, result) = loader.load_all(Vec::new()).await;
        assert!(loaded.is_empty());
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_host_loads_nothing() {
        let (supervisor, _faults) = Supervisor::new();
        let config = PluginsConfig {
            enabled: false,
            ..PluginsConfig::default()
        };
        let host = PluginHost::new(config, "en", EventRegistry::new(), supervisor);
        assert_eq!(host.load().await.unwrap(), 0);
        assert!(host.details().await.is_empty());
        host.close().await.unwrap();
    }

    fn editor() -> EditorDetails {
        EditorDetails {
            id: "wi".to_string(),
            version: "test".to_string(),
        }
    }

    // Wire a plugin to the host end of an in-memory pipe, the way `load`
    // does after the handshake.
    fn attach(loader: &Loader, name: &str, transport: DuplexStream, child: Option<Child>) -> Arc<PluginProcess> {
        let (read, write) = tokio::io::split(transport);
        let (client, channels) = RpcClient::start(name, read, write, &loader.supervisor);
        let plugin = Arc::new(PluginProcess {
            path: PathBuf::from(name),
            pid: child.as_ref().and_then(|c| c.id()),
            details: PluginDetails {
                name: name.to_string(),
                version: "0.0.0".to_string(),
            },
            client: Arc::new(client),
            child: tokio::sync::Mutex::new(child),
            state: Mutex::new(PluginState {
                status: Some(PluginStatus::Loaded),
                ..PluginState::default()
            }),
            quit_timeout: loader.quit_timeout,
        });
        plugin.subscribe(&loader.events);
        loader.watch(&plugin, channels);
        plugin
    }

    async fn wait_for(plugin: &PluginProcess, status: PluginStatus) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while plugin.status() != status {
            assert!(Instant::now() < deadline, "stuck in {}", plugin.status());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[cfg(unix)]
    fn sleeper() -> Child {
        Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    fn is_running(pid: u32) -> bool {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    struct RefusesInit {
        quit: Arc<AtomicBool>,
    }

    impl PluginHandler for RefusesInit {
        fn get_info(&mut self, _language: &str) -> PluginDetails {
            PluginDetails {
                name: "refuses".to_string(),
                version: "1.0".to_string(),
            }
        }

        fn init(&mut self, _editor: &EditorDetails, _host: &Host) -> Result<(), String> {
            Err("not today".to_string())
        }

        fn quit(&mut self, _code: i32) {
            self.quit.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_quarantined_plugin_still_gets_quit() {
        let (loader, _faults) = loader();
        let (host_side, plugin_side) = duplex(4096);
        let quit = Arc::new(AtomicBool::new(false));
        let mut handler = RefusesInit { quit: quit.clone() };
        let _server = tokio::spawn(async move {
            let (read, write) = tokio::io::split(plugin_side);
            serve(&mut handler, read, write).await
        });
        let plugin = attach(&loader, "wi-plugin-refuses", host_side, None);

        plugin.start_init(editor(), &loader.supervisor);
        wait_for(&plugin, PluginStatus::Quarantined).await;
        assert_eq!(plugin.error().as_deref(), Some("remote error: not today"));

        plugin.close().await.unwrap();
        assert!(quit.load(Ordering::SeqCst));
        assert_eq!(plugin.status(), PluginStatus::Closed);
    }

    #[tokio::test]
    async fn test_init_only_starts_from_loaded() {
        let (loader, _faults) = loader();
        let (host_side, _plugin_side) = duplex(4096);
        let plugin = attach(&loader, "wi-plugin-idle", host_side, None);

        plugin.quarantine(&"gone");
        plugin.start_init(editor(), &loader.supervisor);
        assert_eq!(plugin.status(), PluginStatus::Quarantined);

        // Nobody answers the Quit, so this waits out the quit timeout.
        plugin.close().await.unwrap();
        plugin.start_init(editor(), &loader.supervisor);
        assert_eq!(plugin.status(), PluginStatus::Closed);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_unanswered_quit_does_not_block_close() {
        let (loader, _faults) = loader();
        // Open but never read from.
        let (host_side, _mute) = duplex(4096);
        let plugin = attach(&loader, "wi-plugin-mute", host_side, Some(sleeper()));
        let pid = plugin.pid().unwrap();

        let started = Instant::now();
        plugin.close().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= loader.quit_timeout, "{elapsed:?}");
        assert!(elapsed < loader.quit_timeout + Duration::from_secs(1), "{elapsed:?}");
        assert!(!is_running(pid));
        assert_eq!(plugin.status(), PluginStatus::Closed);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_keeps_first_error_and_still_kills() {
        let (loader, _faults) = loader();
        let (host_side, plugin_side) = duplex(4096);
        let plugin = attach(&loader, "wi-plugin-gone", host_side, Some(sleeper()));
        let pid = plugin.pid().unwrap();

        drop(plugin_side);
        wait_for(&plugin, PluginStatus::Quarantined).await;

        let err = plugin.close().await.unwrap_err();
        assert!(matches!(err, PluginError::Rpc(RpcError::Closed)), "{err}");
        assert_eq!(plugin.status(), PluginStatus::Closed);
        assert!(!is_running(pid));
        assert_eq!(loader.events.listener_count(EventKind::WindowCreated), 0);
        // Already closed.
        plugin.close().await.unwrap();
    }
}
