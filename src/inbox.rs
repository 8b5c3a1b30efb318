use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    task::JoinHandle,
};

use crate::{
    background::{Background, Command},
    infrastructure::shutdown::ShutdownListener,
    session::{SessionCommand, SessionHandle},
};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Request {
    Background(Command),
    Session(SessionCommand),
}

/// Accepts one JSON request per line on stdin and writes one JSON reply per
/// line to stdout.
pub fn spawn_stdin_inbox(
    background: Arc<Background>,
    session: SessionHandle,
    shutdown: ShutdownListener,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        if let Err(err) = serve(reader, writer, &background, &session, shutdown).await {
            tracing::error!(target: "inbox", error = %err, "command inbox crashed");
        }
    })
}

async fn serve<R, W>(
    reader: R,
    mut writer: W,
    background: &Background,
    session: &SessionHandle,
    mut shutdown: ShutdownListener,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.notified() => break,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(Request::Background(command)) => {
                serde_json::to_string(&background.handle(command).await)?
            }
            Ok(Request::Session(command)) => serde_json::to_string(&session.execute(command).await)?,
            Err(err) => {
                tracing::warn!(target: "inbox", error = %err, "unrecognized request");
                serde_json::json!({ "type": "invalid", "error": err.to_string() }).to_string()
            }
        };
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    tracing::info!(target: "inbox", "command inbox closed");
    Ok(())
}
