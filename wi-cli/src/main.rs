// wi-cli/src/main.rs
mod cli;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{Receiver, never, select, tick};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wi_core::{
    ConfigFile, Editor, EventRegistry, Fault, LogConfig, PluginHost, Supervisor, Terminal as _,
    TerminalEvent, ViewRegistry,
};
use wi_views::{RootView, bootstrap_commands, register_default_views};

use cli::Cli;
use terminal::CrosstermTerminal;

/// Alerts expire on this clock.
const TICK_RATE: Duration = Duration::from_millis(250);

/// Environment variable overriding the configured log filter.
const LOG_ENV: &str = "WI_LOG";

type PluginLoad = Result<usize, String>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, config_error) = match &cli.config {
        Some(path) => (
            ConfigFile::load_from(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None,
        ),
        None => match ConfigFile::load() {
            Ok(config) => (config, None),
            Err(e) => (ConfigFile::default(), Some(e)),
        },
    };
    if cli.no_plugins {
        config.plugins.enabled = false;
    }
    init_tracing(&config.log, cli.log_file.as_deref())?;
    if let Some(e) = config_error {
        warn!(error = %e, "failed to load config, using defaults");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("wi-runtime")
        .build()
        .context("start async runtime")?;
    let (supervisor, faults) = Supervisor::new();
    let events = EventRegistry::new();

    terminal::install_panic_hook();
    let mut term = CrosstermTerminal::new().context("set up terminal")?;

    let result = run(&cli, &config, &runtime, &supervisor, faults, events, &mut term);

    if let Err(e) = term.restore() {
        warn!(error = %e, "failed to restore terminal");
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("bye");
    result
}

fn run(
    cli: &Cli,
    config: &ConfigFile,
    runtime: &tokio::runtime::Runtime,
    supervisor: &Supervisor,
    faults: Receiver<Fault>,
    events: EventRegistry,
    term: &mut CrosstermTerminal,
) -> Result<()> {
    let mut views = ViewRegistry::new();
    register_default_views(&mut views);

    let size = term.size().context("query terminal size")?;
    let mut editor = Editor::new(Box::new(RootView::new(&[])), views, events.clone(), size);
    for (key, command) in &config.keys {
        editor.tree_mut().bind_global(key, command);
    }
    editor.post(bootstrap_commands(editor.tree().root()));
    editor.drain();
    editor.set_language(&config.language);
    for line in &cli.commands {
        let words: Vec<&str> = line.split_whitespace().collect();
        editor.run(&words);
    }
    editor.drain();

    let host = Arc::new(PluginHost::new(
        config.plugins.clone(),
        &config.language,
        events,
        supervisor.clone(),
    ));
    let (loaded_tx, loaded) = crossbeam::channel::bounded::<PluginLoad>(1);
    {
        let _rt = runtime.enter();
        let host = host.clone();
        supervisor.spawn("plugin-loader", async move {
            let result = host.load().await.map_err(|e| e.to_string());
            let _ = loaded_tx.send(result);
        });
    }

    let input = terminal::spawn_input(supervisor).context("start input thread")?;
    let result = control_loop(&mut editor, term, input, faults, loaded);

    info!("shutting down");
    if let Err(e) = runtime.block_on(host.close()) {
        warn!(error = %e, "error while closing plugins");
    }
    result
}

/// Everything that touches the window tree happens here, one message at a
/// time. Frames are drawn once the queued commands have been drained.
fn control_loop(
    editor: &mut Editor,
    term: &mut CrosstermTerminal,
    input: Receiver<TerminalEvent>,
    faults: Receiver<Fault>,
    mut loaded: Receiver<PluginLoad>,
) -> Result<()> {
    let queue = editor.queue();
    let ticker = tick(TICK_RATE);

    loop {
        editor.render(term).context("draw frame")?;
        if editor.should_quit() {
            return Ok(());
        }

        let mut load_result = None;
        select! {
            recv(input) -> event => match event {
                Ok(TerminalEvent::Key(key)) => editor.on_key(key),
                Ok(TerminalEvent::Resize(size)) => editor.on_resize(size),
                Err(_) => anyhow::bail!("terminal input closed"),
            },
            recv(queue) -> lines => {
                if let Ok(lines) = lines {
                    editor.run_all(&lines);
                }
            },
            recv(faults) -> fault => {
                if let Ok(fault) = fault {
                    return Err(fault).context("internal task failed");
                }
            },
            recv(loaded) -> result => load_result = Some(result),
            recv(ticker) -> _ => editor.tick(Instant::now()),
        }

        if let Some(result) = load_result {
            loaded = never();
            match result {
                Ok(Ok(count)) => info!(count, "plugins loaded"),
                Ok(Err(message)) => editor.alert(&message),
                Err(_) => warn!("plugin loader went away"),
            }
        }
        editor.drain();
    }
}

/// Log to a file: the terminal is the UI.
fn init_tracing(config: &LogConfig, file_override: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.level));
    let path: Option<PathBuf> = file_override.map(Path::to_path_buf).or_else(|| config.file_path());
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}
