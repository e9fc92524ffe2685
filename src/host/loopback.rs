//! In-process bridge between a Correlator and a [`NativeGitHost`]

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::NativeGitHost;
use crate::bridge::{NativeChannel, NativePort};

struct LoopbackPort {
    outbound: mpsc::UnboundedSender<String>,
}

impl NativePort for LoopbackPort {
    fn post_message(&self, message: String) -> Result<(), String> {
        self.outbound
            .send(message)
            .map_err(|_| "native host stopped".to_string())
    }
}

/// Wire `host` up as the native peer of a new channel.
///
/// Each request is handled on its own task, so a slow clone does not hold up
/// a status query. Must be called from inside a tokio runtime.
pub fn connect(host: Arc<NativeGitHost>) -> NativeChannel {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let host = Arc::clone(&host);
            let in_tx = in_tx.clone();
            tokio::spawn(async move {
                if let Some(reply) = host.handle(&message).await {
                    // 对端已关闭时丢弃
                    let _ = in_tx.send(reply);
                }
            });
        }
        debug!("Loopback bridge closed");
    });

    NativeChannel::new(Arc::new(LoopbackPort { outbound: out_tx }), in_rx)
}
