//! View composer: combines the two fetch state machines with the remote
//! store and turns user commands into state changes.
//!
//! Fetches run as spawned tasks and report back over a channel as
//! [`FetchOutcome`]s; the owner of the composer feeds them to
//! [`ViewComposer::apply`] from its event loop, so all state is mutated from
//! one logical thread.

pub mod command;
pub mod filters;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

pub use command::{UserCommand, HELP};
pub use filters::DisplayFilters;

use crate::fetch::{FetchState, FetchStateMachine, FetchTicket};
use crate::photos::{FetchError, MarsPhoto, PhotoRecord, PhotoSource};
use crate::store::{RemoteStore, ROLLS_KEY};

pub const MSG_SAVED: &str = "Photos saved successfully.";
pub const MSG_SAVE_FAILED: &str = "Failed to save photos.";
pub const MSG_LOADED: &str = "Last saved photos loaded successfully.";
pub const MSG_LOAD_FAILED: &str = "Failed to load last saved photos.";
pub const MSG_NOTHING_TO_SAVE: &str = "Nothing to save yet.";

/// How many times the user has rolled. Owned by the composer and mirrored to
/// the store after every increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollCounter {
    value: u64,
}

impl RollCounter {
    pub fn new(value: u64) -> Self {
        Self { value }
    }

    /// Read the persisted count (0 when nothing was stored).
    pub async fn load(store: &RemoteStore) -> Self {
        Self::new(store.get_count(ROLLS_KEY).await)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn increment(&mut self) -> u64 {
        self.value = self.value.saturating_add(1);
        self.value
    }
}

/// A finished fetch, tagged with the source and ticket it belongs to.
#[derive(Debug)]
pub enum FetchOutcome {
    Mars(FetchTicket, Result<Vec<MarsPhoto>, FetchError>),
    Picsum(FetchTicket, Result<Vec<PhotoRecord>, FetchError>),
}

/// Whether the caller's loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// What to show right now. Every variant carries the latest status message.
#[derive(Debug)]
pub enum View<'a> {
    Loading { message: Option<&'a str> },
    Error { message: Option<&'a str> },
    Ready(ReadyView<'a>),
}

#[derive(Debug)]
pub struct ReadyView<'a> {
    pub mars: &'a MarsPhoto,
    pub picsum: &'a PhotoRecord,
    pub picsum_display_url: String,
    pub mars_summary: Option<String>,
    pub picsum_summary: Option<String>,
    pub filters: DisplayFilters,
    pub rolls: u64,
    /// Set when the pair came from the store rather than the latest fetch.
    pub saved_at: Option<i64>,
    pub message: Option<&'a str>,
}

pub struct ViewComposer {
    mars_source: Arc<dyn PhotoSource<MarsPhoto>>,
    picsum_source: Arc<dyn PhotoSource<PhotoRecord>>,
    mars: FetchStateMachine<MarsPhoto>,
    picsum: FetchStateMachine<PhotoRecord>,
    store: Arc<RemoteStore>,
    filters: DisplayFilters,
    /// Last saved pair shown in place of the fetched one.
    loaded: Option<(MarsPhoto, PhotoRecord)>,
    rolls: RollCounter,
    message: Option<String>,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
}

impl fmt::Debug for ViewComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewComposer")
            .field("mars", self.mars.state())
            .field("picsum", self.picsum.state())
            .field("filters", &self.filters)
            .field("rolls", &self.rolls)
            .finish_non_exhaustive()
    }
}

impl ViewComposer {
    /// Build a composer and the receiver its fetch results arrive on.
    /// No fetch is started until [`refresh`](Self::refresh).
    pub fn new(
        mars_source: Arc<dyn PhotoSource<MarsPhoto>>,
        picsum_source: Arc<dyn PhotoSource<PhotoRecord>>,
        store: Arc<RemoteStore>,
        rolls: RollCounter,
    ) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let composer = Self {
            mars_source,
            picsum_source,
            mars: FetchStateMachine::new(),
            picsum: FetchStateMachine::new(),
            store,
            filters: DisplayFilters::default(),
            loaded: None,
            rolls,
            message: None,
            outcomes: tx,
        };
        (composer, rx)
    }

    #[cfg(test)]
    pub fn rolls(&self) -> RollCounter {
        self.rolls
    }

    #[cfg(test)]
    pub fn filters(&self) -> DisplayFilters {
        self.filters
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[cfg(test)]
    pub fn mars_state(&self) -> &FetchState<MarsPhoto> {
        self.mars.state()
    }

    #[cfg(test)]
    pub fn picsum_state(&self) -> &FetchState<PhotoRecord> {
        self.picsum.state()
    }

    /// Put both machines into `Loading` and start one fetch per source.
    /// Filters, status message, and any loaded pair are reset along with the
    /// result screen.
    pub fn refresh(&mut self) {
        self.filters = DisplayFilters::default();
        self.loaded = None;
        self.message = None;

        let fetch = self.mars.refresh(Arc::clone(&self.mars_source));
        let tx = self.outcomes.clone();
        tokio::spawn(async move {
            let (ticket, result) = fetch.await;
            // The receiver only goes away on shutdown.
            let _ = tx.send(FetchOutcome::Mars(ticket, result));
        });

        let fetch = self.picsum.refresh(Arc::clone(&self.picsum_source));
        let tx = self.outcomes.clone();
        tokio::spawn(async move {
            let (ticket, result) = fetch.await;
            let _ = tx.send(FetchOutcome::Picsum(ticket, result));
        });
    }

    /// Feed a finished fetch into its state machine. Returns `false` when the
    /// result belonged to a superseded refresh and was dropped.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        match outcome {
            FetchOutcome::Mars(ticket, result) => self.mars.complete(ticket, result),
            FetchOutcome::Picsum(ticket, result) => self.picsum.complete(ticket, result),
        }
    }

    /// Apply outcomes until the view leaves `Loading`. Only meaningful after
    /// [`refresh`](Self::refresh); before that nothing is in flight.
    pub async fn settle(&mut self, outcomes: &mut mpsc::UnboundedReceiver<FetchOutcome>) {
        while self.is_loading() {
            match outcomes.recv().await {
                Some(outcome) => {
                    self.apply(outcome);
                }
                None => break,
            }
        }
    }

    /// Whether the view is still `Loading`. A failed Mars fetch ends the
    /// wait even while Picsum is pending.
    pub fn is_loading(&self) -> bool {
        let mars = self.mars.state();
        mars.is_loading() || (!mars.is_error() && self.picsum.state().is_loading())
    }

    pub async fn handle(&mut self, command: UserCommand) -> Flow {
        match command {
            UserCommand::Roll => self.roll().await,
            UserCommand::ToggleGrayscale => self.filters.toggle_grayscale(),
            UserCommand::ToggleBlur => self.filters.toggle_blur(),
            UserCommand::Save => self.save().await,
            UserCommand::LoadLast => self.load_last().await,
            UserCommand::Help => self.message = Some(HELP.to_string()),
            UserCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn roll(&mut self) {
        self.refresh();
        let rolls = self.rolls.increment();
        // Not transactional: a failed write only loses the persisted copy.
        if let Err(e) = self.store.set_count(ROLLS_KEY, rolls).await {
            tracing::warn!(rolls, "Failed to persist roll count: {}", e);
        }
    }

    async fn save(&mut self) {
        let (mut mars, mut picsum) = match self.displayed() {
            Some((mars, picsum)) => (mars.clone(), self.filters.bake(picsum)),
            None => {
                self.message = Some(MSG_NOTHING_TO_SAVE.to_string());
                return;
            }
        };
        self.message = Some(
            match self.store.save_pair(&mut mars, &mut picsum).await {
                Ok(_) => MSG_SAVED,
                Err(e) => {
                    tracing::error!("Failed to save photos: {}", e);
                    MSG_SAVE_FAILED
                }
            }
            .to_string(),
        );
    }

    async fn load_last(&mut self) {
        let (mars, picsum) = self.store.load_last_pair().await;
        tracing::debug!(?mars, ?picsum, "Loaded last saved photos");
        match (mars, picsum) {
            (Some(mars), Some(picsum)) => {
                let (filters, picsum) = DisplayFilters::restore(&picsum);
                self.filters = filters;
                self.loaded = Some((mars, picsum));
                self.message = Some(MSG_LOADED.to_string());
            }
            _ => self.message = Some(MSG_LOAD_FAILED.to_string()),
        }
    }

    /// The pair currently on screen: a loaded pair if any, else the chosen
    /// records of both successful fetches.
    fn displayed(&self) -> Option<(&MarsPhoto, &PhotoRecord)> {
        if let Some((mars, picsum)) = &self.loaded {
            return Some((mars, picsum));
        }
        Some((self.mars.state().chosen()?, self.picsum.state().chosen()?))
    }

    pub fn view(&self) -> View<'_> {
        let message = self.message.as_deref();
        let (mars_state, picsum_state) = (self.mars.state(), self.picsum.state());
        // Mars decides first; Picsum only matters once Mars has succeeded.
        match (mars_state, picsum_state) {
            (FetchState::Loading, _) | (FetchState::Success { .. }, FetchState::Loading) => {
                return View::Loading { message }
            }
            (FetchState::Error, _) | (FetchState::Success { .. }, FetchState::Error) => {
                return View::Error { message }
            }
            (FetchState::Success { .. }, FetchState::Success { .. }) => {}
        }
        let Some((mars, picsum)) = self.displayed() else {
            return View::Error { message };
        };
        View::Ready(ReadyView {
            mars,
            picsum,
            picsum_display_url: self.filters.display_url(&picsum.download_url),
            mars_summary: mars_state.summary(self.mars_source.name()),
            picsum_summary: picsum_state.summary(self.picsum_source.name()),
            filters: self.filters,
            rolls: self.rolls.value(),
            saved_at: self.loaded.as_ref().and_then(|(mars, _)| mars.saved_at),
            message,
        })
    }
}

impl fmt::Display for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            View::Loading { message } => {
                write!(f, "Loading...")?;
                message
            }
            View::Error { message } => {
                write!(f, "Loading failed. Type `roll` to try again.")?;
                message
            }
            View::Ready(ready) => return write!(f, "{}", ready),
        };
        match message {
            Some(message) => write!(f, "\n{}", message),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ReadyView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(saved_at) = self.saved_at {
            let when = DateTime::<Utc>::from_timestamp_millis(saved_at)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| saved_at.to_string());
            writeln!(f, "Last saved pair ({})", when)?;
        }
        if let Some(summary) = &self.mars_summary {
            writeln!(f, "{}", summary)?;
        }
        writeln!(f, "  Mars photo {}: {}", self.mars.id, self.mars.img_src)?;
        if let Some(summary) = &self.picsum_summary {
            writeln!(f, "{}", summary)?;
        }
        writeln!(
            f,
            "  Picsum photo {} by {} ({}x{}): {}",
            self.picsum.id,
            self.picsum.author,
            self.picsum.width,
            self.picsum.height,
            self.picsum_display_url
        )?;
        writeln!(f, "Filters: {}", self.filters.describe())?;
        write!(f, "Rolls: {}", self.rolls)?;
        if let Some(message) = self.message {
            write!(f, "\n{}", message)?;
        }
        Ok(())
    }
}
