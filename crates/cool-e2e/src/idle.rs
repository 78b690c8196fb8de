//! Waiting for a flickering element to settle
//!
//! Some parts of the UI (the mobile wizard in particular) re-render a few
//! times during a transition. Acting on a node that is about to be replaced
//! fails with a detached-element error, so these helpers first wait until
//! the located node has stayed the same DOM node for a whole idle window.
//!
//! The poller does not distinguish a node that was removed for good from
//! one replaced by an equivalent node: a detached tracked node always resets
//! the window, and if nothing matches any more the re-resolve fails.
//!
//! There is no own timeout. Bound the total wait from the outside, e.g. with
//! `tokio::time::timeout`.

use crate::browser::ElementHandle;
use crate::errors::E2eError;
use crate::frame::ScopedQuery;
use crate::locator::Locator;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// How often the located element is re-checked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default idle window, tuned for the mobile wizard.
pub const DEFAULT_IDLE_TIME: Duration = Duration::from_millis(1250);

/// Per-call state of one wait-for-idle.
#[derive(Debug, Clone)]
pub struct PollState {
    tracked: ElementHandle,
    idle: Duration,
    interval: Duration,
    threshold: Duration,
}

/// What happened during a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// The tracked node was still attached; idle time grew by one interval.
    Stable,
    /// The tracked node was detached and replaced; idle time went back to 0.
    Reset,
}

impl PollState {
    pub fn new(tracked: ElementHandle, threshold: Duration) -> Self {
        Self {
            tracked,
            idle: Duration::ZERO,
            interval: POLL_INTERVAL,
            threshold,
        }
    }

    pub fn tracked(&self) -> &ElementHandle {
        &self.tracked
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Fold the outcome of one poll into the state.
    pub fn record(&mut self, tracked_detached: bool, current: ElementHandle) -> PollEvent {
        if tracked_detached {
            self.tracked = current;
            self.idle = Duration::ZERO;
            PollEvent::Reset
        } else {
            self.idle += self.interval;
            PollEvent::Stable
        }
    }

    /// Idle strictly longer than the threshold.
    pub fn is_idle(&self) -> bool {
        self.idle > self.threshold
    }
}

/// Summary of a finished wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleReport {
    pub element: ElementHandle,
    pub cycles: u32,
    pub resets: u32,
    pub idle: Duration,
}

impl ScopedQuery {
    /// Suspend until the element located by `locator` has remained the same
    /// DOM node for longer than `threshold` (default [`DEFAULT_IDLE_TIME`]).
    #[instrument(skip(self, locator), fields(locator = %locator))]
    pub async fn wait_until_idle(
        &self,
        locator: &Locator,
        threshold: Option<Duration>,
    ) -> Result<IdleReport, E2eError> {
        let threshold = threshold.unwrap_or(DEFAULT_IDLE_TIME);
        info!("Waiting item to be idle - start.");
        debug!(?threshold, "Param - waitingTime");

        let initial = self.resolve(locator).await?;
        let mut state = PollState::new(initial.into_handle(), threshold);
        let mut cycles = 0u32;
        let mut resets = 0u32;

        loop {
            tokio::time::sleep(state.interval()).await;
            cycles += 1;

            let current = self.resolve(locator).await?.into_handle();
            let detached = self.browser().is_detached(state.tracked()).await?;
            let elapsed = state.idle() + state.interval();
            if state.record(detached, current) == PollEvent::Reset {
                resets += 1;
                info!("Item was detached after {} ms.", elapsed.as_millis());
            }
            if state.is_idle() {
                break;
            }
        }

        info!("Waiting item to be idle - end.");
        Ok(IdleReport {
            element: state.tracked().clone(),
            cycles,
            resets,
            idle: state.idle(),
        })
    }

    /// Wait for the element to be idle, then click it.
    ///
    /// Only worth it for elements known to flicker; it is much slower than a
    /// plain click.
    #[instrument(skip(self, locator), fields(locator = %locator))]
    pub async fn click_on_idle(
        &self,
        locator: &Locator,
        threshold: Option<Duration>,
    ) -> Result<(), E2eError> {
        info!("Clicking on item when idle - start.");
        self.wait_until_idle(locator, threshold).await?;
        self.resolve(locator).await?.click().await?;
        info!("Clicking on item when idle - end.");
        Ok(())
    }

    /// Wait for an input to be idle, then replace its value with `input` and
    /// confirm with Enter.
    #[instrument(skip(self))]
    pub async fn input_on_idle(
        &self,
        selector: &str,
        input: &str,
        threshold: Option<Duration>,
    ) -> Result<(), E2eError> {
        info!("Type into an input item when idle - start.");
        let locator = Locator::new(selector);
        self.wait_until_idle(&locator, threshold).await?;
        let element = self.resolve(&locator).await?;
        element.clear().await?;
        element.type_text(input).await?;
        element.type_text("{enter}").await?;
        info!("Type into an input item when idle - end.");
        Ok(())
    }
}
