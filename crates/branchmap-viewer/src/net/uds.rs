use crate::net::Incoming;
use anyhow::{Context, Result};
use branchmap_core::Msg;
use crossbeam_channel::Sender;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Runs the agent connection on its own thread. Frames from the agent go to
/// `tx`; messages on `out` are written to the agent. Reconnects after the
/// agent goes away.
pub fn spawn_client(sock_path: String, tx: Sender<Incoming>, out: UnboundedReceiver<Msg>) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                let _ = tx.send(Incoming::error(sock_path.clone(), format!("tokio runtime: {e}")));
                return;
            }
        };
        rt.block_on(async move {
            let mut out = out;
            loop {
                if let Err(e) = run(&sock_path, &tx, &mut out).await {
                    let _ = tx.send(Incoming::error(sock_path.clone(), format!("{e:#}")));
                }
                let _ = tx.send(Incoming::disconnected(sock_path.clone()));
                if out.is_closed() {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                // Requests queued while disconnected were already failed
                // by the UI; do not replay them.
                while out.try_recv().is_ok() {}
            }
        });
    });
}

async fn run(sock_path: &str, tx: &Sender<Incoming>, out: &mut UnboundedReceiver<Msg>) -> Result<()> {
    let stream = UnixStream::connect(sock_path)
        .await
        .with_context(|| format!("connect UDS {sock_path}"))?;

    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    let _ = tx.send(Incoming::connected(sock_path.to_string()));
    framed.send(Bytes::from(Msg::hello().encode()?)).await?;

    loop {
        tokio::select! {
            frame = framed.next() => {
                let Some(frame) = frame else { break };
                let bytes = frame?;
                match Msg::decode(&bytes) {
                    Ok(m) => {
                        let _ = tx.send(Incoming::from_msg(sock_path.to_string(), m));
                    }
                    Err(e) => {
                        let _ = tx.send(Incoming::error(sock_path.to_string(), format!("decode error: {e}")));
                    }
                }
            }
            msg = out.recv() => {
                let Some(msg) = msg else { break };
                framed.send(Bytes::from(msg.encode()?)).await?;
            }
        }
    }
    Ok(())
}
