//! Relay loop: the orchestrator.
//!
//! One inbound message becomes one LLM reply becomes one bridge send. Two
//! modes, fixed at startup:
//! - **Manual**: each console line is treated as the correspondent's message.
//! - **Automatic**: the bridge is polled on a fixed interval.
//!
//! Everything runs sequentially; no two bridge calls or LLM calls overlap.
//! Errors inside a cycle are reported and the loop carries on.

pub mod console;

pub use console::{ConsoleInput, EXIT_KEYWORD};

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::bridge::{self, Bridge};
use crate::config::{RelayMode, RelaySettings};
use crate::error::{BridgeError, Error, LlmError};
use crate::llm::{self, LlmProvider};

/// One completed inbound-message → reply → send exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub persona: String,
    pub user_message: String,
    pub reply: String,
}

/// What a single cycle ended up doing.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing to act on this cycle.
    NoMessage,
    /// A reply was generated and handed to the bridge.
    Forwarded(ConversationTurn),
    /// Poll, reply or send failed; the cycle was abandoned.
    Failed(Error),
}

/// Counters reported when a loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub forwarded: u64,
    pub failed: u64,
}

impl LoopStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::NoMessage => {}
            CycleOutcome::Forwarded(_) => self.forwarded += 1,
            CycleOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// The relay orchestrator.
pub struct Relay {
    settings: RelaySettings,
    llm: Arc<dyn LlmProvider>,
    bridge: Arc<dyn Bridge>,
}

impl Relay {
    pub fn new(settings: RelaySettings, llm: Arc<dyn LlmProvider>, bridge: Arc<dyn Bridge>) -> Self {
        Self {
            settings,
            llm,
            bridge,
        }
    }

    /// Ask the LLM for a reply, bounded by the reply deadline.
    pub async fn generate_reply(&self, user_message: &str) -> Result<String, LlmError> {
        llm::reply_with_deadline(
            self.llm.as_ref(),
            self.settings.reply_timeout,
            &self.settings.persona,
            user_message,
        )
        .await
    }

    /// Hand a finished turn to the bridge. No deadline beyond shutdown.
    pub async fn forward(&self, user_message: &str, reply: &str) -> Result<(), BridgeError> {
        self.bridge
            .send(&self.settings.target, &self.settings.persona, user_message, reply)
            .await
    }

    /// Reply to one inbound message and forward the reply.
    ///
    /// The bridge is only called if the LLM produced a reply.
    pub async fn process_message(&self, user_message: &str) -> CycleOutcome {
        let turn_id = Uuid::new_v4();
        let span = info_span!("turn", %turn_id);
        async {
            debug!(chars = user_message.chars().count(), "Requesting reply");

            let reply = match self.generate_reply(user_message).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("LLM error: {e}");
                    return CycleOutcome::Failed(e.into());
                }
            };

            if self.settings.mode == RelayMode::Manual {
                println!("Bot> {reply}");
            }

            if let Err(e) = self.forward(user_message, &reply).await {
                error!("Send to {} failed: {e}", self.settings.target);
                return CycleOutcome::Failed(e.into());
            }

            info!(
                correspondent = %self.settings.target,
                message = %user_message,
                reply = %reply,
                "Reply forwarded through bridge"
            );
            if self.settings.mode == RelayMode::Manual {
                println!("Forwarded to {} via bridge.", self.settings.target);
            }

            CycleOutcome::Forwarded(ConversationTurn {
                id: turn_id,
                persona: self.settings.persona.clone(),
                user_message: user_message.to_string(),
                reply,
            })
        }
        .instrument(span)
        .await
    }

    /// One automatic-mode cycle without the trailing sleep.
    pub async fn poll_cycle(&self) -> CycleOutcome {
        let polled = bridge::poll_with_deadline(
            self.bridge.as_ref(),
            self.settings.poll_timeout,
            &self.settings.target,
        )
        .await;

        let poll = match polled {
            Ok(poll) => poll,
            Err(e) => {
                error!("Poll failed: {e}");
                return CycleOutcome::Failed(e.into());
            }
        };

        let Some(message) = poll.actionable_message() else {
            debug!("No new message from {}", self.settings.target);
            return CycleOutcome::NoMessage;
        };

        info!(
            correspondent = %self.settings.target,
            message = %message,
            "New message received"
        );
        self.process_message(message).await
    }

    /// Manual mode: read lines from `input` until EOF, `exit`, a read error,
    /// or `shutdown` resolves.
    ///
    /// Lines that are not valid UTF-8 (e.g. a GBK console) are decoded lossily
    /// rather than ending the loop.
    pub async fn run_manual<R, S>(&self, mut input: R, shutdown: S) -> LoopStats
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        let mut buf = Vec::new();
        let mut stats = LoopStats::default();
        tokio::pin!(shutdown);

        loop {
            eprint!("{}> ", self.settings.target);

            buf.clear();
            let read = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping");
                    break;
                }
                read = input.read_until(b'\n', &mut buf) => read,
            };

            let line = match read {
                Ok(0) => {
                    info!("End of input, stopping");
                    break;
                }
                Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
                Err(e) => {
                    error!("Error reading console input: {e}");
                    break;
                }
            };

            let message = match ConsoleInput::parse(&line) {
                ConsoleInput::Empty => continue,
                ConsoleInput::Exit => {
                    info!("Exit requested, stopping");
                    break;
                }
                ConsoleInput::Message(message) => message,
            };

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received mid-turn, stopping");
                    break;
                }
                outcome = self.process_message(&message) => outcome,
            };
            stats.record(&outcome);
        }

        stats
    }

    /// Automatic mode: poll, maybe relay, sleep one interval, repeat until
    /// `shutdown` resolves.
    pub async fn run_automatic<S>(&self, shutdown: S) -> LoopStats
    where
        S: Future<Output = ()>,
    {
        let mut stats = LoopStats::default();
        tokio::pin!(shutdown);

        info!(
            correspondent = %self.settings.target,
            interval = ?self.settings.poll_interval,
            "Polling bridge for new messages"
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping");
                    break;
                }
                outcome = self.poll_cycle() => outcome,
            };
            stats.record(&outcome);

            // Same pause whether or not the cycle did any work.
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping");
                    break;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        stats
    }

    /// Run in the configured mode. Manual mode reads stdin.
    pub async fn run<S>(&self, shutdown: S) -> LoopStats
    where
        S: Future<Output = ()>,
    {
        let stats = match self.settings.mode {
            RelayMode::Manual => {
                eprintln!(
                    "Type messages from {} and press Enter. '{}' to quit.",
                    self.settings.target, EXIT_KEYWORD
                );
                let stdin = BufReader::new(tokio::io::stdin());
                self.run_manual(stdin, shutdown).await
            }
            RelayMode::Automatic => self.run_automatic(shutdown).await,
        };

        info!(
            cycles = stats.cycles,
            forwarded = stats.forwarded,
            failed = stats.failed,
            "Relay stopped"
        );
        stats
    }
}
