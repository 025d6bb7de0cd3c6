use std::{
    sync::mpsc::{self, Receiver},
    thread,
};

use tracing::{info, warn};

/// Spawns a watcher that sends once on Ctrl+C.
///
/// If the handler cannot be installed the sender is dropped, which the
/// poller reads as "no interruption source" and keeps running.
pub fn listen_for_interrupt() -> Receiver<()> {
    let (interrupt_tx, interrupt_rx) = mpsc::channel::<()>();

    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(error) => {
                warn!("Could not start interrupt watcher: {error}");
                return;
            }
        };

        match runtime.block_on(tokio::signal::ctrl_c()) {
            Ok(()) => {
                info!("Interrupt received, stopping after the current step.");
                // The poller may already be gone.
                let _ = interrupt_tx.send(());
            }
            Err(error) => warn!("Could not listen for Ctrl+C: {error}"),
        }
    });

    interrupt_rx
}
