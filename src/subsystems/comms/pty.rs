//! PTY (console) comms channel — one chat session on stdin/stdout.
//!
//! Implements [`Component`] so the comms subsystem can spawn it as an
//! independent task.  All desk communication goes through [`CommsState`];
//! this module has no direct access to the back-office.
//!
//! Loaded with `-i`.  Runs until the `shutdown` token is cancelled (Ctrl-C)
//! or stdin is closed.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::subsystems::conversation::MessageView;
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::state::{CommsEvent, CommsState};

// ── PtyChannel ───────────────────────────────────────────────────────────────

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pty(self.channel_id, self.state, shutdown))
    }
}

fn print_message(msg: &MessageView) {
    match (msg.icon, msg.speaker) {
        (Some(icon), Some(speaker)) => println!("{icon} {speaker}: {}", msg.content),
        _ => println!("{}", msg.content),
    }
}

// ── run_pty ──────────────────────────────────────────────────────────────────

async fn run_pty(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started — type a message and press Enter. Ctrl-C to quit.");
    println!("─────────────────────────────────");
    println!(" Loan concierge console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let opened = state.open_session(&channel_id).await?;
    let session_id = opened.session_id;
    opened.messages.iter().for_each(print_message);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut announced_letter: Option<String> = None;

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!("\n[pty] shutdown signal received — closing console channel");
                info!("pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() { continue; }

                        debug!(input = %input, "pty received line");

                        match state.send_message(&channel_id, Some(session_id.as_str()), input).await {
                            Err(e) => {
                                warn!(error = %e, "pty turn failed");
                                println!("[error] {e}");
                            }
                            Ok(turn) => {
                                turn.replies.iter().for_each(print_message);
                                let letter = turn.session.letter_file;
                                if let Some(file) = letter.as_deref().filter(|f| announced_letter.as_deref() != Some(*f)) {
                                    println!("[letter] sanction letter issued: {file}");
                                }
                                announced_letter = letter;
                            }
                        }
                    }
                }
            }
        }
    }

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}
