//! Per-route fetch lifecycle.
//!
//! A [`PageController`] owns the [`FetchState`] of one mounted route. Every
//! trigger issues a new sequence number; a completion is only applied when it
//! carries the latest one, so a slow superseded fetch can never overwrite the
//! result of a newer one.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::{
    application::{
        content::{ContentClient, ContentError, PreviewSession},
        live_preview::{EntryChanged, Subscription},
    },
    domain::page::{FetchState, PageDocument},
};

const SOURCE: &str = "pagewright::lifecycle";

/// Why a fetch was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The route was mounted.
    Mount,
    /// The route now resolves to a different lookup path.
    RouteChange(String),
    /// The live-preview channel reported an edited entry.
    EntryChanged,
}

impl Trigger {
    fn label(&self) -> &'static str {
        match self {
            Trigger::Mount => "mount",
            Trigger::RouteChange(_) => "route_change",
            Trigger::EntryChanged => "entry_changed",
        }
    }
}

/// Handle for one issued fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    sequence: u64,
    path: String,
    preview: Option<PreviewSession>,
}

impl FetchTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

pub type FetchOutcome = Result<Option<PageDocument>, ContentError>;

pub struct PageController {
    client: Arc<dyn ContentClient>,
    path: String,
    preview: Option<PreviewSession>,
    state: FetchState,
    issued: u64,
}

impl PageController {
    pub fn new(client: Arc<dyn ContentClient>, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            preview: None,
            state: FetchState::Idle,
            issued: 0,
        }
    }

    /// Fetch drafts for the editor session `preview` instead of published content.
    pub fn with_preview(mut self, preview: Option<PreviewSession>) -> Self {
        self.preview = preview;
        self
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client(&self) -> Arc<dyn ContentClient> {
        Arc::clone(&self.client)
    }

    /// Enter `Loading` for `trigger` and issue a ticket for the fetch.
    pub fn begin(&mut self, trigger: Trigger) -> FetchTicket {
        let label = trigger.label();
        if let Trigger::RouteChange(path) = trigger {
            self.path = path;
        }
        self.issued += 1;
        self.state = FetchState::Loading;
        debug!(
            target = SOURCE,
            path = %self.path,
            sequence = self.issued,
            trigger = label,
            preview = self.preview.is_some(),
            "fetch started"
        );
        FetchTicket {
            sequence: self.issued,
            path: self.path.clone(),
            preview: self.preview.clone(),
        }
    }

    /// Apply the outcome of `ticket`. Returns `false` when the ticket was
    /// superseded and the outcome discarded.
    pub fn complete(&mut self, ticket: &FetchTicket, outcome: FetchOutcome) -> bool {
        if ticket.sequence != self.issued {
            debug!(
                target = SOURCE,
                path = %ticket.path,
                sequence = ticket.sequence,
                latest = self.issued,
                "discarding superseded fetch"
            );
            return false;
        }

        self.state = settle(&ticket.path, outcome);
        counter!("pagewright_content_fetch_total", "outcome" => self.state.label()).increment(1);
        true
    }

    /// Run one complete fetch cycle for `trigger` and return the settled state.
    pub async fn run_once(&mut self, trigger: Trigger) -> &FetchState {
        let ticket = self.begin(trigger);
        let outcome = fetch(self.client.as_ref(), &ticket).await;
        self.complete(&ticket, outcome);
        &self.state
    }
}

/// Perform the fetch described by `ticket`. Documents that break the block
/// invariants are reported as [`ContentError::Invalid`].
pub async fn fetch(client: &dyn ContentClient, ticket: &FetchTicket) -> FetchOutcome {
    match client.get_page(&ticket.path, ticket.preview.as_ref()).await? {
        Some(document) => match document.validate() {
            Ok(()) => Ok(Some(document)),
            Err(source) => Err(ContentError::Invalid {
                path: ticket.path.clone(),
                source,
            }),
        },
        None => Ok(None),
    }
}

fn settle(path: &str, outcome: FetchOutcome) -> FetchState {
    match outcome {
        Ok(Some(document)) => FetchState::Loaded(document),
        Ok(None) => {
            warn!(target = SOURCE, path, "no content at path");
            FetchState::NotFound
        }
        Err(err) => {
            error!(target = SOURCE, path, error = %err, "content fetch failed");
            FetchState::failed()
        }
    }
}

/// Drive a mounted route for as long as the returned stream is polled.
///
/// The mount fetch runs immediately and only its settled state is yielded,
/// since the route was already rendered once when it was served. Every
/// entry-change notification then yields `Loading` followed by the settled
/// state of the newest fetch. Dropping the stream unmounts the route and
/// releases `subscription`.
pub fn live_states(
    mut controller: PageController,
    mut subscription: Subscription,
) -> impl Stream<Item = FetchState> {
    stream! {
        let (tx, mut rx) = mpsc::unbounded_channel::<(FetchTicket, FetchOutcome)>();
        let client = controller.client();

        let ticket = controller.begin(Trigger::Mount);
        spawn_fetch(Arc::clone(&client), ticket, tx.clone());

        loop {
            let event = tokio::select! {
                change = subscription.changed() => LiveEvent::Changed(change),
                Some(done) = rx.recv() => LiveEvent::Completed(done),
                else => break,
            };

            match event {
                LiveEvent::Changed(None) => break,
                LiveEvent::Changed(Some(change)) => {
                    debug!(
                        target = SOURCE,
                        path = %controller.path(),
                        generation = change.generation,
                        "entry changed, refetching"
                    );
                    let ticket = controller.begin(Trigger::EntryChanged);
                    yield controller.state().clone();
                    spawn_fetch(Arc::clone(&client), ticket, tx.clone());
                }
                LiveEvent::Completed((ticket, outcome)) => {
                    if controller.complete(&ticket, outcome) {
                        yield controller.state().clone();
                    }
                }
            }
        }
    }
}

enum LiveEvent {
    Changed(Option<EntryChanged>),
    Completed((FetchTicket, FetchOutcome)),
}

fn spawn_fetch(
    client: Arc<dyn ContentClient>,
    ticket: FetchTicket,
    tx: mpsc::UnboundedSender<(FetchTicket, FetchOutcome)>,
) {
    tokio::spawn(async move {
        let outcome = fetch(client.as_ref(), &ticket).await;
        // The route may have unmounted while the fetch was in flight.
        let _ = tx.send((ticket, outcome));
    });
}
