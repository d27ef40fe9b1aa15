use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::info;

/// Shared stop request. Cloned into whatever may need to end the render loop:
/// the interrupt handler, the simulator window, tests.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Routes SIGINT/SIGTERM into this token. Only one handler may be installed
    /// per process.
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if !token.is_cancelled() {
                info!("Interrupted, shutting down");
            }
            token.cancel();
        })
    }
}
