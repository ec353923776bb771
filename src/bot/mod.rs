//! Chat command front end.
//!
//! Long-polls the messaging channel, registers senders as subscribers, and
//! runs manual scans on `/scan`. Each manual scan runs as its own task so
//! the poller keeps serving; scans still running at shutdown are aborted.

pub mod commands;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::dispatcher::{self, Dispatcher};
use crate::engine::report;
use crate::engine::scanner::ScanOrchestrator;
use crate::messaging::{InboundMessage, Markup, UpdateSource};
use crate::subscribers::SubscriberRegistry;
use crate::types::{Recipient, ScanRequest, Timeframe};

use commands::Command;

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct CommandBot {
    updates: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    orchestrator: Arc<ScanOrchestrator>,
    registry: SubscriberRegistry,
    /// Empty = every chat may use the bot.
    allowed_chats: HashSet<i64>,
    quote_asset: String,
    scheduled: Vec<Timeframe>,
}

impl CommandBot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        updates: Arc<dyn UpdateSource>,
        dispatcher: Arc<Dispatcher>,
        orchestrator: Arc<ScanOrchestrator>,
        registry: SubscriberRegistry,
        allowed_chats: impl IntoIterator<Item = i64>,
        quote_asset: &str,
        scheduled: Vec<Timeframe>,
    ) -> Self {
        Self {
            updates,
            dispatcher,
            orchestrator,
            registry,
            allowed_chats: allowed_chats.into_iter().collect(),
            quote_asset: quote_asset.to_uppercase(),
            scheduled,
        }
    }

    fn is_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }

    /// Handle one inbound message. Returns the manual scan to start, if any.
    pub async fn handle_message(&self, message: InboundMessage) -> Option<ScanRequest> {
        let (Some(chat_id), Some(text)) = (message.chat_id, message.text) else {
            return None;
        };
        let command = commands::parse(&text, &self.quote_asset)?;

        if !self.is_allowed(chat_id) {
            debug!(chat_id, "Ignoring command from chat outside allow-list");
            return None;
        }

        let recipient = Recipient::from(chat_id);
        self.registry.register(recipient.clone()).await;
        let default_top = self.orchestrator.settings().default_top;

        let reply = match command {
            Ok(Command::Start) | Ok(Command::Help) => {
                commands::welcome_text(default_top, &self.scheduled)
            }
            Ok(Command::Scan(args)) => {
                let ack = commands::ack_text(&args, default_top);
                if let Err(e) = self.dispatcher.send(&recipient, &ack, Markup::Plain).await {
                    warn!(error = %e, "Failed to acknowledge scan");
                }
                return Some(ScanRequest::new(
                    args.symbol,
                    args.timeframe,
                    args.selector,
                    recipient,
                ));
            }
            Err(e) => report::render_error(&e),
        };

        if let Err(e) = self.dispatcher.send(&recipient, &reply, Markup::Plain).await {
            warn!(error = %e, "Failed to reply to command");
        }
        None
    }

    /// Poll for commands until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut offset: Option<i64> = None;
        let mut scans: JoinSet<()> = JoinSet::new();
        // Set after a failed poll; polling resumes once it passes.
        let mut paused_until: Option<Instant> = None;

        info!(allow_list = self.allowed_chats.len(), "Command poller started");

        loop {
            tokio::select! {
                polled = async { self.updates.poll(offset).await }, if paused_until.is_none() => match polled {
                    Ok(batch) => {
                        for message in batch {
                            offset = Some(message.update_id + 1);
                            if let Some(request) = self.handle_message(message).await {
                                let this = Arc::clone(&self);
                                scans.spawn(async move {
                                    // Outcome already logged and replied to.
                                    let _ = dispatcher::manual_scan(
                                        &this.orchestrator,
                                        &this.dispatcher,
                                        &request,
                                    )
                                    .await;
                                });
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %format!("{e:#}"), "Polling for commands failed");
                        paused_until = Some(Instant::now() + POLL_RETRY_DELAY);
                    }
                },
                _ = tokio::time::sleep_until(paused_until.unwrap_or_else(Instant::now)), if paused_until.is_some() => {
                    paused_until = None;
                }
                Some(joined) = scans.join_next(), if !scans.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Manual scan task panicked");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(cancelled = scans.len(), "Command poller stopping");
        scans.shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
