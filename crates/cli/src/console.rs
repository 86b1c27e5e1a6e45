//! A stdin/stdout chat channel, mostly for local administration.

use std::future::Future;

use {
    async_trait::async_trait,
    motifini_chat::{Notification, Outbound, Reply},
    motifini_subscribe::Subscriber,
    tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    tracing::{debug, info},
};

use crate::app::App;

/// API name console messages arrive on.
pub const CONSOLE_API: &str = "console";

fn render(reply: &Reply) -> String {
    let mut out = reply.text.trim_end().to_string();
    for file in &reply.files {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("[attachment] {}", file.display()));
    }
    out
}

/// Read commands line by line until EOF or `shutdown` resolves, writing
/// each non-empty reply back.
pub async fn run_console<R, W>(
    app: &App,
    reader: R,
    mut writer: W,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let contact = app.config.console.contact.as_str();
    let mut lines = reader.lines();
    tokio::pin!(shutdown);

    info!(contact, "console ready, type 'help'");
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = &mut shutdown => {
                info!("shutdown requested");
                break;
            },
        };
        let Some(line) = line else {
            debug!("console input closed");
            break;
        };

        let reply = app
            .dispatcher
            .handle_message(CONSOLE_API, contact, &line)
            .await;
        if reply.is_empty() {
            continue;
        }
        writer.write_all(render(&reply).as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Prints notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct StdoutOutbound;

#[async_trait]
impl Outbound for StdoutOutbound {
    async fn send(&self, subscriber: &Subscriber, notification: &Notification) -> anyhow::Result<()> {
        let mut line = format!(
            "-> ({}) {}: [{}] {}",
            subscriber.api(),
            subscriber.contact(),
            notification.event,
            notification.text
        );
        if let Some(file) = &notification.file {
            line.push_str(&format!(" [attachment] {}", file.display()));
        }
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}
