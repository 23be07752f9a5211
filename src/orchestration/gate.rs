use tokio::sync::watch;

/// One-shot latch. Waiters block until the gate is opened; opening it again
/// has no effect.
#[derive(Debug)]
pub struct CompletionGate {
    sender: watch::Sender<bool>,
}

impl CompletionGate {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Open the gate. Returns `true` only for the call that opened it.
    pub fn open(&self) -> bool {
        self.sender.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    pub fn is_open(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until the gate is open. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as self, so this cannot observe a closed
        // channel
        let _ = receiver.wait_for(|open| *open).await;
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}
