//! Session driver: feeds UI events to the controller and keeps fetches moving
//!
//! One task owns the controller. It waits on either the next UI event or the
//! next finished fetch, so transitions never overlap while any number of
//! fetches are in flight.

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::controller::{NodeStateChanged, PendingFetch, TreeController};
use crate::error::TreeError;
use crate::node::NodeId;

/// Input from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    NodeActivated(NodeId),
    FacetSelected(String),
}

/// Output to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    NodeStateChanged(NodeStateChanged),
    CatalogChanged {
        selected: Vec<String>,
        remaining: Vec<String>,
        exhausted: bool,
    },
    FacetRejected {
        facet: String,
        error: TreeError,
    },
    /// Activation named a node the tree does not hold
    UnknownNode(NodeId),
}

pub struct TreeSession {
    controller: TreeController,
}

impl TreeSession {
    pub fn new(controller: TreeController) -> Self {
        Self { controller }
    }

    /// Run until `inbox` closes and no fetch is in flight
    ///
    /// Returns the controller so callers can inspect the final tree.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<UiEvent>,
        outbox: mpsc::Sender<SessionOutput>,
    ) -> TreeController {
        let mut in_flight = FuturesUnordered::new();
        let mut inbox_open = true;

        let seed: Vec<PendingFetch> = self.controller.seed_root().into_iter().collect();
        for fetch in self.announce(seed, &outbox).await {
            in_flight.push(fetch.run());
        }

        loop {
            tokio::select! {
                event = inbox.recv(), if inbox_open => match event {
                    Some(event) => {
                        let fetches = self.handle(event, &outbox).await;
                        for fetch in fetches {
                            in_flight.push(fetch.run());
                        }
                    }
                    None => {
                        debug!(in_flight = in_flight.len(), "inbox closed");
                        inbox_open = false;
                    }
                },
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    let completion = self.controller.complete(outcome);
                    if let Some(changed) = completion.changed {
                        emit(&outbox, SessionOutput::NodeStateChanged(changed)).await;
                    }
                    if let Some(fetch) = completion.follow_up {
                        in_flight.push(fetch.run());
                    }
                }
                else => break,
            }
        }

        info!(nodes = self.controller.tree().len(), "session finished");
        self.controller
    }

    async fn handle(
        &mut self,
        event: UiEvent,
        outbox: &mpsc::Sender<SessionOutput>,
    ) -> Vec<PendingFetch> {
        match event {
            UiEvent::NodeActivated(id) => match self.controller.activate(id) {
                Ok(fetch) => self.announce(fetch.into_iter().collect(), outbox).await,
                Err(_) => {
                    emit(outbox, SessionOutput::UnknownNode(id)).await;
                    Vec::new()
                }
            },
            UiEvent::FacetSelected(facet) => match self.controller.select_facet(&facet) {
                Ok(fetches) => {
                    let catalog = self.controller.catalog();
                    let changed = SessionOutput::CatalogChanged {
                        selected: catalog.selected().to_vec(),
                        remaining: catalog.remaining().to_vec(),
                        exhausted: catalog.is_exhausted(),
                    };
                    emit(outbox, changed).await;
                    self.announce(fetches, outbox).await
                }
                Err(error) => {
                    emit(outbox, SessionOutput::FacetRejected { facet, error }).await;
                    Vec::new()
                }
            },
        }
    }

    /// Emit the `Loading` state of each node about to be fetched
    async fn announce(
        &self,
        fetches: Vec<PendingFetch>,
        outbox: &mpsc::Sender<SessionOutput>,
    ) -> Vec<PendingFetch> {
        for fetch in &fetches {
            if let Some(snapshot) = self.controller.snapshot(fetch.node()) {
                emit(outbox, SessionOutput::NodeStateChanged(snapshot)).await;
            }
        }
        fetches
    }
}

async fn emit(outbox: &mpsc::Sender<SessionOutput>, output: SessionOutput) {
    if outbox.send(output).await.is_err() {
        debug!("session output dropped; receiver closed");
    }
}
