//! Frame-scoped element queries
//!
//! Under the Nextcloud integration the document application lives two
//! iframes deep. Instead of rerouting every query through ambient state, a
//! [`ScopedQuery`] is obtained for an explicit [`FrameScope`] and all lookups
//! go through it.

use crate::browser::{Browser, ElementHandle, PixelSource, Rect};
use crate::errors::E2eError;
use crate::expect::{Expectation, RETRY_INTERVAL};
use crate::keys::parse_key_sequence;
use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Outer frame hosting the document viewer inside Nextcloud.
pub const RICHDOCUMENTS_FRAME: &str = "iframe#richdocumentsframe";
/// Inner frame holding the document application itself.
pub const LEAFLET_FRAME: &str = "iframe#loleafletframe";

/// Which document element queries run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameScope {
    /// The top-level page.
    #[default]
    Top,
    /// Nesting level 1: the Nextcloud document viewer frame.
    RichDocuments,
    /// Nesting level 2: the document application frame.
    Leaflet,
}

impl FrameScope {
    pub fn level(self) -> u8 {
        match self {
            FrameScope::Top => 0,
            FrameScope::RichDocuments => 1,
            FrameScope::Leaflet => 2,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(FrameScope::Top),
            1 => Some(FrameScope::RichDocuments),
            2 => Some(FrameScope::Leaflet),
            _ => None,
        }
    }

    /// Iframe selectors to descend through, outermost first.
    pub fn frame_path(self) -> &'static [&'static str] {
        match self {
            FrameScope::Top => &[],
            FrameScope::RichDocuments => &[RICHDOCUMENTS_FRAME],
            FrameScope::Leaflet => &[RICHDOCUMENTS_FRAME, LEAFLET_FRAME],
        }
    }
}

/// Element queries bound to one frame scope.
#[derive(Clone)]
pub struct ScopedQuery {
    browser: Arc<dyn Browser>,
    scope: FrameScope,
    timeout: Duration,
}

impl ScopedQuery {
    pub fn new(browser: Arc<dyn Browser>, scope: FrameScope, timeout: Duration) -> Self {
        Self {
            browser,
            scope,
            timeout,
        }
    }

    pub fn scope(&self) -> FrameScope {
        self.scope
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    /// Same scope, different retry timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            browser: self.browser.clone(),
            scope: self.scope,
            timeout,
        }
    }

    /// Same browser and timeout, another frame.
    pub fn in_scope(&self, scope: FrameScope) -> Self {
        Self {
            browser: self.browser.clone(),
            scope,
            timeout: self.timeout,
        }
    }

    fn wrap(&self, handle: ElementHandle) -> Element {
        Element {
            browser: self.browser.clone(),
            handle,
        }
    }

    /// Every current match, without waiting.
    pub async fn all(&self, locator: impl Into<Locator>) -> Result<Vec<Element>, E2eError> {
        let locator = locator.into();
        let handles = self.browser.query(self.scope, &locator).await?;
        Ok(handles.into_iter().map(|h| self.wrap(h)).collect())
    }

    pub async fn count(&self, locator: impl Into<Locator>) -> Result<usize, E2eError> {
        let locator = locator.into();
        Ok(self.browser.query(self.scope, &locator).await?.len())
    }

    /// Whether anything matches right now, without waiting.
    pub async fn exists(&self, locator: impl Into<Locator>) -> Result<bool, E2eError> {
        Ok(self.count(locator).await? > 0)
    }

    /// First element matching `locator`, retrying until one appears or the
    /// query timeout elapses.
    #[instrument(level = "debug", skip(self), fields(scope = ?self.scope))]
    pub async fn resolve(&self, locator: &Locator) -> Result<Element, E2eError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let mut handles = self.browser.query(self.scope, locator).await?;
            if !handles.is_empty() {
                return Ok(self.wrap(handles.swap_remove(0)));
            }
            if Instant::now() >= deadline {
                debug!("No element matched {} within {:?}", locator, self.timeout);
                return Err(E2eError::ElementNotFound(format!(
                    "{locator} (in {:?} after {:?})",
                    self.scope, self.timeout
                )));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    pub async fn get(&self, selector: &str) -> Result<Element, E2eError> {
        self.resolve(&Locator::new(selector)).await
    }

    pub async fn contains(&self, selector: &str, content: &str) -> Result<Element, E2eError> {
        self.resolve(&Locator::contains(selector, content)).await
    }

    /// Retrying assertions on whatever `locator` matches.
    pub fn expect(&self, locator: impl Into<Locator>) -> Expectation {
        Expectation::new(self.clone(), locator.into())
    }
}

/// A resolved element together with the browser that owns it.
#[derive(Clone)]
pub struct Element {
    browser: Arc<dyn Browser>,
    handle: ElementHandle,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element").field("handle", &self.handle).finish()
    }
}

impl Element {
    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    pub fn into_handle(self) -> ElementHandle {
        self.handle
    }

    pub async fn is_detached(&self) -> Result<bool, E2eError> {
        self.browser.is_detached(&self.handle).await
    }

    pub async fn text(&self) -> Result<String, E2eError> {
        self.browser.text(&self.handle).await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, E2eError> {
        self.browser.attribute(&self.handle, name).await
    }

    pub async fn has_class(&self, class: &str) -> Result<bool, E2eError> {
        Ok(self
            .browser
            .classes(&self.handle)
            .await?
            .iter()
            .any(|c| c == class))
    }

    pub async fn is_visible(&self) -> Result<bool, E2eError> {
        self.browser.is_visible(&self.handle).await
    }

    pub async fn rect(&self) -> Result<Rect, E2eError> {
        self.browser.rect(&self.handle).await
    }

    pub async fn child_count(&self, child_selector: &str) -> Result<usize, E2eError> {
        self.browser.child_count(&self.handle, child_selector).await
    }

    pub async fn click(&self) -> Result<(), E2eError> {
        debug!("Clicking {}", self.handle);
        self.browser.click(&self.handle).await
    }

    pub async fn clear(&self) -> Result<(), E2eError> {
        self.browser.clear(&self.handle).await
    }

    /// Type a brace-escaped key sequence into the element.
    pub async fn type_text(&self, text: &str) -> Result<(), E2eError> {
        let keys = parse_key_sequence(text)?;
        self.browser.type_keys(&self.handle, &keys, false).await
    }

    /// Like [`Element::type_text`] but without requiring visibility.
    pub async fn type_text_forced(&self, text: &str) -> Result<(), E2eError> {
        let keys = parse_key_sequence(text)?;
        self.browser.type_keys(&self.handle, &keys, true).await
    }

    pub async fn hide(&self) -> Result<(), E2eError> {
        self.browser.hide(&self.handle).await
    }

    pub async fn attach_file(&self, path: &Path) -> Result<(), E2eError> {
        self.browser.attach_file(&self.handle, path).await
    }

    pub async fn pixel_data(&self, source: PixelSource) -> Result<Vec<u8>, E2eError> {
        self.browser.pixel_data(&self.handle, source).await
    }
}
