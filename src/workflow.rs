use std::io::{BufRead, Write};
use std::net::IpAddr;

use tracing::{debug, info, warn};

use crate::config::{AddressSource, AppConfig};
use crate::error::{Error, Result};
use crate::message::{parse_address, IpKind, LeaseMessage, LeaseResult};
use crate::queue::{QueueClient, QueueEndpoint};

const PROMPT: &str = "Enter 'c' to lease an address, 'a' to reseed the pool or 'q' to quit:";

const HELP: &str = "\
Commands:
  c, lease   take one address from the pool
  a, seed    send the configured addresses to the pool again
  h, help    show this message
  q, quit    exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Lease,
    Seed,
    Help,
    Quit,
    Unknown,
}

impl Command {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "c" | "lease" => Command::Lease,
            "a" | "seed" => Command::Seed,
            "h" | "help" => Command::Help,
            "q" | "quit" => Command::Quit,
            _ => Command::Unknown,
        }
    }
}

/// What one seeding pass did with each configured address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub sent: Vec<IpAddr>,
    pub invalid: Vec<String>,
    pub failed: Vec<(IpAddr, String)>,
}

impl SeedReport {
    pub fn attempts(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Leases addresses out of a queue-backed pool.
///
/// Built with [`Workflow::connect`], which resolves the queue once; every
/// later call reuses that endpoint.
pub struct Workflow<Q> {
    queue: Q,
    endpoint: QueueEndpoint,
    config: AppConfig,
    source: AddressSource,
}

impl<Q: QueueClient> Workflow<Q> {
    /// Checks the queue name and resolves it. Both failures are fatal.
    pub async fn connect(queue: Q, config: AppConfig, source: AddressSource) -> Result<Self> {
        if config.queue_name.trim().is_empty() {
            return Err(Error::MissingQueueName);
        }
        let endpoint = queue
            .resolve_queue_url(&config.queue_name)
            .await
            .map_err(|e| Error::Resolution {
                name: config.queue_name.clone(),
                source: Box::new(e),
            })?;
        info!(queue = %config.queue_name, endpoint = %endpoint, "resolved queue");
        Ok(Self {
            queue,
            endpoint,
            config,
            source,
        })
    }

    pub fn endpoint(&self) -> &QueueEndpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Publishes one message per valid address. Invalid literals and failed
    /// sends are reported and skipped; neither stops the remaining sends.
    pub async fn seed<W: Write>(&self, addresses: &[String], out: &mut W) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        for raw in addresses {
            let address = match parse_address(raw) {
                Ok(address) => address,
                Err(e) => {
                    warn!(input = %raw, "skipping invalid seed address");
                    writeln!(out, "Skipping invalid address: {}", e)?;
                    report.invalid.push(raw.clone());
                    continue;
                }
            };

            let message = LeaseMessage::new(address);
            match self.queue.send_message(&self.endpoint, &message).await {
                Ok(()) => {
                    writeln!(out, "Sent {} ({})", message.body(), message.kind())?;
                    report.sent.push(address);
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "send failed");
                    writeln!(out, "Got an error sending {}: {}", address, e)?;
                    report.failed.push((address, e.to_string()));
                }
            }
        }
        debug!(
            sent = report.sent.len(),
            invalid = report.invalid.len(),
            failed = report.failed.len(),
            "seed finished"
        );
        Ok(report)
    }

    /// Re-reads the address list from its source and seeds it.
    pub async fn reseed<W: Write>(&self, out: &mut W) -> Result<SeedReport> {
        let (addresses, reload_err) = self.source.load();
        if let Some(e) = reload_err {
            warn!(error = %e, "reload failed, using startup addresses");
            writeln!(out, "Could not reload addresses ({}); using the startup list", e)?;
        }
        self.seed(&addresses, out).await
    }

    /// Receives one address and deletes it to complete the lease.
    ///
    /// A failed delete is reported but the address stays leased: it has
    /// already been shown, so there is nothing to roll back. A receive
    /// failure is returned to the caller.
    pub async fn lease<W: Write>(&self, out: &mut W) -> Result<LeaseResult> {
        let mut messages = self
            .queue
            .receive_messages(&self.endpoint, 1, self.config.visibility_timeout())
            .await?;
        let Some(message) = messages.pop() else {
            writeln!(out, "No address available right now.")?;
            writeln!(out, "Enter 'a' to send the configured addresses to the pool.")?;
            return Ok(LeaseResult::Unavailable);
        };

        // kind comes from the body, not from the Type attribute
        match parse_address(&message.body) {
            Ok(address) => {
                writeln!(out, "Leased address: {} ({})", message.body, IpKind::of(&address))?
            }
            Err(_) => writeln!(out, "Leased address: {}", message.body)?,
        }

        if let Err(e) = self
            .queue
            .delete_message(&self.endpoint, &message.receipt_handle)
            .await
        {
            warn!(address = %message.body, error = %e, "lease not finalized");
            writeln!(out, "Got an error finalizing the lease of {}: {}", message.body, e)?;
        }

        Ok(LeaseResult::Available {
            address: message.body,
            receipt_handle: message.receipt_handle,
        })
    }

    /// Runs the command loop until `quit` or end of input.
    pub async fn run<R: BufRead, W: Write>(&self, mut input: R, out: &mut W) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            writeln!(out, "{}", PROMPT)?;
            out.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                debug!("end of input");
                return Ok(());
            }

            // undecodable bytes fall through to Unknown
            let command = Command::parse(&String::from_utf8_lossy(&buf));
            debug!(?command, "dispatch");
            match command {
                Command::Lease => match self.lease(out).await {
                    Ok(_) => {}
                    Err(e @ Error::Io(_)) => return Err(e),
                    Err(e) => {
                        warn!(error = %e, "lease failed");
                        writeln!(out, "Got an error receiving an address: {}", e)?;
                    }
                },
                Command::Seed => {
                    self.reseed(out).await?;
                }
                Command::Help => writeln!(out, "{}", HELP)?,
                Command::Quit => return Ok(()),
                Command::Unknown => {}
            }
        }
    }
}
