//! Loading/Success/Error state machine around one remote photo-list fetch.
//!
//! Every refresh bumps a generation counter and hands out a [`FetchTicket`].
//! Results are applied only when their ticket is still current, so a slow
//! response from an earlier refresh can never overwrite a newer one even
//! though the transport does not cancel it.

use std::future::Future;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::photos::{FetchError, PhotoSource};

/// Observable state of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState<T> {
    Loading,
    /// `chosen` is picked once per successful fetch and is always an element
    /// of `photos`.
    Success {
        photos: Vec<T>,
        chosen: T,
    },
    Error,
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchState::Error)
    }

    pub fn chosen(&self) -> Option<&T> {
        match self {
            FetchState::Success { chosen, .. } => Some(chosen),
            FetchState::Loading | FetchState::Error => None,
        }
    }

    /// One-line description of a successful fetch, e.g.
    /// `Success: 25 Picsum photos retrieved`.
    pub fn summary(&self, label: &str) -> Option<String> {
        match self {
            FetchState::Success { photos, .. } => Some(format!(
                "Success: {} {} photos retrieved",
                photos.len(),
                label
            )),
            FetchState::Loading | FetchState::Error => None,
        }
    }
}

/// Identifies the refresh a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub struct FetchStateMachine<T> {
    state: FetchState<T>,
    generation: u64,
}

impl<T> Default for FetchStateMachine<T> {
    fn default() -> Self {
        Self {
            state: FetchState::Loading,
            generation: 0,
        }
    }
}

impl<T: Clone> FetchStateMachine<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FetchState<T> {
        &self.state
    }

    /// Enter `Loading` and invalidate every ticket issued so far.
    pub fn begin_refresh(&mut self) -> FetchTicket {
        self.generation += 1;
        self.state = FetchState::Loading;
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Whether results for `ticket` would still be applied.
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply a fetch result. Returns `false` when the ticket is stale and the
    /// result was dropped.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<Vec<T>, FetchError>) -> bool {
        self.complete_with_rng(ticket, result, &mut rand::thread_rng())
    }

    pub fn complete_with_rng<R: Rng + ?Sized>(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<T>, FetchError>,
        rng: &mut R,
    ) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                stale = ticket.generation(),
                current = self.generation,
                "Dropping stale fetch result"
            );
            return false;
        }
        self.state = settle(result, rng);
        true
    }

    /// Begin a refresh and return the fetch for it.
    ///
    /// The machine is `Loading` as soon as this returns. The future owns
    /// everything it needs, so the caller may await it inline or spawn it,
    /// then hand the output back to [`complete`](Self::complete).
    pub fn refresh<S>(
        &mut self,
        source: Arc<S>,
    ) -> impl Future<Output = (FetchTicket, Result<Vec<T>, FetchError>)> + Send + 'static
    where
        S: PhotoSource<T> + ?Sized + 'static,
        T: Send + 'static,
    {
        let ticket = self.begin_refresh();
        async move {
            let result = source.list().await;
            if let Err(e) = &result {
                tracing::warn!(source = source.name(), "Photo fetch failed: {}", e);
            }
            (ticket, result)
        }
    }
}

fn settle<T: Clone, R: Rng + ?Sized>(
    result: Result<Vec<T>, FetchError>,
    rng: &mut R,
) -> FetchState<T> {
    let photos = match result {
        Ok(photos) => photos,
        Err(_) => return FetchState::Error,
    };
    match photos.choose(rng).cloned() {
        Some(chosen) => FetchState::Success { photos, chosen },
        None => {
            tracing::warn!("{}", FetchError::Empty);
            FetchState::Error
        }
    }
}
