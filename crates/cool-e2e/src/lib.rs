//! End-to-end test helpers for the online office document editor
//!
//! The helpers drive the browser client through the [`Browser`] trait: open
//! a test document (locally, behind the php proxy or inside Nextcloud), type
//! and select text, check the clipboard, work with Impress slides and shapes,
//! and close the document again. [`CdpBrowser`] drives a real Chrome.
//!
//! Every helper hangs off a [`Session`], which carries the backend, the run
//! configuration and the frame the application currently lives in.

pub mod browser;
pub mod canvas;
pub mod cdp;
pub mod config;
pub mod document;
pub mod errors;
pub mod expect;
pub mod frame;
pub mod idle;
pub mod impress;
pub mod keys;
pub mod locator;
pub mod nextcloud;
pub mod session;
#[cfg(test)]
mod tests;
pub mod text;

pub use browser::{Browser, ElementHandle, PixelSource, Rect};
pub use canvas::PixelCheck;
pub use cdp::{CdpBrowser, CdpConfig};
pub use config::{CoreVersion, Integration, TestEnv};
pub use document::{DocType, Device, TestState};
pub use errors::E2eError;
pub use expect::{wait_for, Expectation};
pub use frame::{Element, FrameScope, ScopedQuery};
pub use idle::{IdleReport, DEFAULT_IDLE_TIME, POLL_INTERVAL};
pub use impress::SlideDirection;
pub use keys::{parse_key_sequence, KeyStroke};
pub use locator::Locator;
pub use session::Session;
pub use text::{Axis, CursorModifier, Direction, DEFAULT_CURSOR};

/// Install a `tracing` subscriber filtered by `RUST_LOG`, for test binaries
/// and small drivers. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
