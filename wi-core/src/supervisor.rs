// wi-core/src/supervisor.rs
use crossbeam::channel::{Receiver, Sender, unbounded};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use tracing::error;

/// A task or thread that panicked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task {task} panicked: {message}")]
pub struct Fault {
    pub task: String,
    pub message: String,
}

/// Runs tasks so that a panic turns into a [`Fault`] on one channel instead
/// of silently killing the task. Whoever holds the receiver decides how to
/// shut down.
#[derive(Debug, Clone)]
pub struct Supervisor {
    faults: Sender<Fault>,
}

impl Supervisor {
    pub fn new() -> (Self, Receiver<Fault>) {
        let (faults, rx) = unbounded();
        (Self { faults }, rx)
    }

    /// Spawn `future` on the current tokio runtime.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let faults = self.faults.clone();
        let name = name.into();
        tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                report(&faults, name, panic);
            }
        })
    }

    /// Spawn `f` on a named OS thread.
    pub fn spawn_thread<F>(&self, name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let faults = self.faults.clone();
        let name = name.into();
        thread::Builder::new().name(name.clone()).spawn(move || {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
                report(&faults, name, panic);
            }
        })
    }
}

fn report(faults: &Sender<Fault>, task: String, panic: Box<dyn Any + Send>) {
    let fault = Fault {
        task,
        message: panic_message(panic.as_ref()),
    };
    error!(task = %fault.task, message = %fault.message, "task panicked");
    // Nobody listening means we are already shutting down.
    let _ = faults.send(fault);
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
