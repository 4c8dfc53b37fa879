use tokio::sync::mpsc;

/// Inbound control surface for the external conversational loop. The
/// sender pauses the listener before claiming the microphone and resumes
/// it after releasing it; the engine neither knows nor asks why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Pause,
    Resume,
}

/// Cloneable handle given to the external collaborator. Delivery is
/// at-least-once; the engine treats duplicates as no-ops.
#[derive(Clone)]
pub struct CoordinationHandle {
    tx: mpsc::Sender<ListenerControl>,
}

impl CoordinationHandle {
    pub async fn pause(&self) {
        self.send(ListenerControl::Pause).await;
    }

    pub async fn resume(&self) {
        self.send(ListenerControl::Resume).await;
    }

    async fn send(&self, msg: ListenerControl) {
        if self.tx.send(msg).await.is_err() {
            tracing::debug!(?msg, "listener control dropped; engine is gone");
        }
    }
}

pub fn coordination_channel(capacity: usize) -> (CoordinationHandle, mpsc::Receiver<ListenerControl>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CoordinationHandle { tx }, rx)
}
