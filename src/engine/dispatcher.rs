//! Report dispatch.
//!
//! Wraps the messaging channel: renders scan results and errors, and turns
//! channel failures into `ScanError::DeliveryFailed`. Also hosts the manual
//! scan flow (scan, then reply to the requester).

use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::report::{self, ChartLinks};
use crate::engine::scanner::ScanOrchestrator;
use crate::messaging::{Markup, Messenger};
use crate::types::{Recipient, ScanError, ScanRequest, ScanResult};

pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    links: ChartLinks,
}

impl Dispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, links: ChartLinks) -> Self {
        Self { messenger, links }
    }

    /// Send text to one recipient.
    pub async fn send(
        &self,
        recipient: &Recipient,
        text: &str,
        markup: Markup,
    ) -> Result<(), ScanError> {
        self.messenger
            .send(recipient, text, markup)
            .await
            .map_err(|e| ScanError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: format!("{e:#}"),
            })
    }

    pub async fn send_report(
        &self,
        recipient: &Recipient,
        result: &ScanResult,
    ) -> Result<(), ScanError> {
        let text = report::render(result, &self.links);
        self.send(recipient, &text, Markup::Markdown).await
    }

    pub async fn send_error(&self, recipient: &Recipient, err: &ScanError) -> Result<(), ScanError> {
        self.send(recipient, &report::render_error(err), Markup::Plain)
            .await
    }
}

/// Manual trigger: scan, then reply to the requester with the report or a
/// single error line. Scan and delivery failures are both returned.
pub async fn manual_scan(
    orchestrator: &ScanOrchestrator,
    dispatcher: &Dispatcher,
    request: &ScanRequest,
) -> Result<ScanResult, ScanError> {
    let recipient = &request.recipient;

    match orchestrator.run_scan_bounded(request).await {
        Ok(result) => {
            dispatcher.send_report(recipient, &result).await?;
            info!(recipient = %recipient, anomalies = result.entries.len(), "Manual scan delivered");
            Ok(result)
        }
        Err(err) => {
            warn!(recipient = %recipient, error = %err, "Manual scan failed");
            if let Err(delivery) = dispatcher.send_error(recipient, &err).await {
                warn!(error = %delivery, "Could not report scan failure");
            }
            Err(err)
        }
    }
}
