//! SIGINT / SIGTERM listener.
//!
//! Runs a current-thread tokio runtime on its own thread and fires the
//! [`ShutdownHandle`] on the first signal. If no listener can be
//! registered the handle is parked with the thread, so the loop keeps
//! running and can only be killed.

use std::io;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use tokio::signal::unix::{SignalKind, signal};

use crate::shutdown::ShutdownHandle;

pub fn install(handle: ShutdownHandle) -> io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("envmon-signals".into())
        .spawn(move || {
            let received = runtime.block_on(async {
                let mut term = match signal(SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("cannot listen for SIGTERM: {}", e);
                        return tokio::signal::ctrl_c().await.map(|()| "SIGINT");
                    }
                };
                tokio::select! {
                    r = tokio::signal::ctrl_c() => r.map(|()| "SIGINT"),
                    _ = term.recv() => Ok("SIGTERM"),
                }
            });

            match received {
                Ok(name) => {
                    info!("{} received, stopping after the current tick", name);
                    handle.trigger();
                }
                Err(e) => {
                    warn!("signal listener failed: {}", e);
                    loop {
                        thread::park();
                    }
                }
            }
        })
}
