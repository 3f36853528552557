use anyhow::{Context, Result};
use branchmap_core::{Msg, PROTOCOL_VERSION};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::backend::{reply_for, Generator};

pub async fn run(sock_path: &str, identity: Msg, generator: Arc<dyn Generator>) -> Result<()> {
    let listener = UnixListener::bind(sock_path).with_context(|| format!("bind UDS {sock_path}"))?;
    tracing::info!(sock_path, "branchmap-agent listening");

    loop {
        let (stream, _addr) = listener.accept().await?;
        tracing::info!("viewer connected");
        let identity = identity.clone();
        let generator = Arc::clone(&generator);
        tokio::spawn(async move {
            match serve_viewer(stream, identity, generator).await {
                Ok(()) => tracing::info!("viewer disconnected"),
                Err(e) => tracing::warn!(error = %e, "viewer connection failed"),
            }
        });
    }
}

/// Serves one viewer. Generation requests run concurrently; replies are
/// written in completion order.
pub async fn serve_viewer<S>(stream: S, identity: Msg, generator: Arc<dyn Generator>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Msg>();
    let mut in_flight = 0usize;

    loop {
        tokio::select! {
            frame = framed.next() => {
                let Some(frame) = frame else { break };
                let bytes = frame.context("read frame")?;
                let msg = match Msg::decode(&bytes) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable frame");
                        continue;
                    }
                };
                match msg {
                    Msg::Hello { version } => {
                        if version != PROTOCOL_VERSION {
                            tracing::warn!(%version, expected = PROTOCOL_VERSION, "protocol version mismatch");
                        }
                        send(&mut framed, &Msg::hello()).await?;
                        send(&mut framed, &identity).await?;
                    }
                    Msg::Ping => send(&mut framed, &Msg::Pong).await?,
                    Msg::Generate { request_id, request } => {
                        tracing::info!(request_id, model = %request.model, "generate");
                        in_flight += 1;
                        let generator = Arc::clone(&generator);
                        let done_tx = done_tx.clone();
                        tokio::spawn(async move {
                            let reply = reply_for(generator.as_ref(), &request).await;
                            let _ = done_tx.send(Msg::Generated { request_id, reply });
                        });
                    }
                    other => tracing::debug!(msg = ?other, "ignoring message"),
                }
            }
            Some(reply) = done_rx.recv() => {
                in_flight = in_flight.saturating_sub(1);
                send(&mut framed, &reply).await?;
            }
        }
    }

    if in_flight > 0 {
        tracing::info!(in_flight, "viewer left with requests in flight");
    }
    Ok(())
}

async fn send<S>(framed: &mut Framed<S, LengthDelimitedCodec>, msg: &Msg) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(Bytes::from(msg.encode()?)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EchoBackend;
    use branchmap_core::{GenerateReply, GenerateRequest};
    use tokio::io::duplex;

    async fn recv<S>(framed: &mut Framed<S, LengthDelimitedCodec>) -> Msg
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let bytes = framed.next().await.expect("frame").expect("read");
        Msg::decode(&bytes).expect("decode")
    }

    #[tokio::test]
    async fn hello_identity_then_generated_reply() {
        let (client, server) = duplex(64 * 1024);
        let identity = Msg::Identity {
            agent: "test".into(),
            host: "h".into(),
            backend: "echo".into(),
            models: vec!["echo".into()],
        };
        let task = tokio::spawn(serve_viewer(server, identity, Arc::new(EchoBackend)));

        let mut viewer = Framed::new(client, LengthDelimitedCodec::new());
        send(&mut viewer, &Msg::hello()).await.unwrap();
        assert!(matches!(recv(&mut viewer).await, Msg::Hello { .. }));
        assert!(matches!(recv(&mut viewer).await, Msg::Identity { .. }));

        send(&mut viewer, &Msg::Ping).await.unwrap();
        assert!(matches!(recv(&mut viewer).await, Msg::Pong));

        let request = GenerateRequest {
            model: "echo".into(),
            prompt_context: "Context: \"x\"\n\nUser Prompt: hi\n\nPlease provide a concise and helpful response.".into(),
            attachment: None,
        };
        send(&mut viewer, &Msg::Generate { request_id: 9, request }).await.unwrap();
        match recv(&mut viewer).await {
            Msg::Generated { request_id, reply } => {
                assert_eq!(request_id, 9);
                assert_eq!(reply, GenerateReply::Text("**Echo** (echo)\nhi".into()));
            }
            other => panic!("unexpected {other:?}"),
        }

        drop(viewer);
        task.await.unwrap().unwrap();
    }
}
