//! The browser-automation seam
//!
//! Every helper in this crate talks to the browser through [`Browser`]. The
//! DevTools backend in [`crate::cdp`] is the production implementation; tests
//! use an in-memory fake.

use crate::errors::E2eError;
use crate::frame::FrameScope;
use crate::keys::KeyStroke;
use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Opaque reference to one DOM node.
///
/// Two handles refer to the same node iff their ids are equal. A node that
/// the application re-renders gets a new id even if it matches the same
/// locator. `epoch` names the page load the id was handed out in; ids of an
/// earlier load always count as detached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub id: u64,
    pub epoch: u64,
    pub scope: FrameScope,
    pub selector: String,
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({:?})", self.selector, self.id, self.scope)
    }
}

/// Bounding client rectangle in top-level viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Where pixel data for a whiteness check comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelSource {
    /// An `<img>` drawn onto an offscreen canvas, ignoring `inset` pixels on
    /// each edge.
    Image { inset: u32 },
    /// A `<canvas>` element read as-is.
    Canvas,
}

/// Browser-automation primitives used by the helpers.
///
/// Queries are single-shot: retrying until something appears is the job of
/// [`crate::ScopedQuery`] and [`crate::Expectation`].
#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    /// All elements matching `locator` inside the document of `scope`, in
    /// document order. An empty vector is not an error.
    async fn query(
        &self,
        scope: FrameScope,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, E2eError>;

    /// Whether the node behind `element` has been removed from its document.
    async fn is_detached(&self, element: &ElementHandle) -> Result<bool, E2eError>;

    /// Whether the iframe document for `scope` is loaded and has a body.
    async fn frame_ready(&self, scope: FrameScope) -> Result<bool, E2eError>;

    async fn text(&self, element: &ElementHandle) -> Result<String, E2eError>;

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, E2eError>;

    async fn classes(&self, element: &ElementHandle) -> Result<Vec<String>, E2eError>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, E2eError>;

    async fn rect(&self, element: &ElementHandle) -> Result<Rect, E2eError>;

    /// Number of direct children of `element` matching `child_selector`.
    async fn child_count(
        &self,
        element: &ElementHandle,
        child_selector: &str,
    ) -> Result<usize, E2eError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), E2eError>;

    /// Click at top-level viewport coordinates.
    async fn click_at(&self, x: f64, y: f64) -> Result<(), E2eError>;

    async fn double_click_at(&self, x: f64, y: f64) -> Result<(), E2eError>;

    /// Clear the value of an input or textarea.
    async fn clear(&self, element: &ElementHandle) -> Result<(), E2eError>;

    /// Focus `element` and send the key strokes to it. With `force` the
    /// element need not be visible.
    async fn type_keys(
        &self,
        element: &ElementHandle,
        keys: &[KeyStroke],
        force: bool,
    ) -> Result<(), E2eError>;

    /// Hide an element by setting `display: none`.
    async fn hide(&self, element: &ElementHandle) -> Result<(), E2eError>;

    /// Attach a local file to an `<input type="file">`.
    async fn attach_file(&self, element: &ElementHandle, path: &Path) -> Result<(), E2eError>;

    /// RGBA bytes of an image or canvas element.
    async fn pixel_data(
        &self,
        element: &ElementHandle,
        source: PixelSource,
    ) -> Result<Vec<u8>, E2eError>;

    /// Class name of the focused element of the document in `scope`.
    async fn active_element_class(&self, scope: FrameScope) -> Result<String, E2eError>;

    /// `window.innerWidth` of the document in `scope`.
    async fn window_width(&self, scope: FrameScope) -> Result<f64, E2eError>;

    async fn user_agent(&self) -> Result<String, E2eError>;

    async fn visit(&self, url: &str) -> Result<(), E2eError>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), E2eError>;

    /// Stop uncaught exceptions of the page from failing the test.
    async fn ignore_uncaught_exceptions(&self) -> Result<(), E2eError>;
}
