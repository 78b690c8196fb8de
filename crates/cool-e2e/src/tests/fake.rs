//! Scripted in-memory browser for driving the helpers without Chrome.
//!
//! Nodes match a query when one of their registered selectors equals the
//! query selector (or one part of a comma-separated group). Changes over
//! time are scheduled against the tokio clock, so tests run with
//! `start_paused = true` and advance deterministically.

use crate::browser::{Browser, ElementHandle, PixelSource, Rect};
use crate::errors::E2eError;
use crate::frame::FrameScope;
use crate::keys::KeyStroke;
use crate::locator::Locator;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub id: u64,
    pub scope: FrameScope,
    pub selectors: Vec<String>,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub classes: Vec<String>,
    pub visible: bool,
    pub rect: Rect,
    pub connected: bool,
    pub children: HashMap<String, usize>,
    pub pixels: Vec<u8>,
}

impl FakeNode {
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn class(&mut self, class: &str) -> &mut Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn hidden(&mut self) -> &mut Self {
        self.visible = false;
        self
    }

    pub fn rect(&mut self, left: f64, top: f64, right: f64, bottom: f64) -> &mut Self {
        self.rect = Rect::new(left, top, right, bottom);
        self
    }

    pub fn children(&mut self, selector: &str, count: usize) -> &mut Self {
        self.children.insert(selector.to_string(), count);
        self
    }

    pub fn pixels(&mut self, pixels: Vec<u8>) -> &mut Self {
        self.pixels = pixels;
        self
    }

    pub fn in_scope(&mut self, scope: FrameScope) -> &mut Self {
        self.scope = scope;
        self
    }

    /// Register another selector this node answers to.
    pub fn also(&mut self, selector: &str) -> &mut Self {
        self.selectors.push(selector.to_string());
        self
    }

    fn matches(&self, scope: FrameScope, locator: &Locator) -> bool {
        self.connected
            && self.scope == scope
            && locator
                .selector
                .split(',')
                .map(str::trim)
                .any(|part| self.selectors.iter().any(|s| s == part))
            && locator
                .content
                .as_deref()
                .map_or(true, |content| self.text.contains(content))
    }
}

/// Everything the helpers did to the browser, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Click(String),
    ClickAt(f64, f64),
    DoubleClickAt(f64, f64),
    Clear(String),
    Type {
        selector: String,
        keys: String,
        force: bool,
    },
    Hide(String),
    Attach {
        selector: String,
        path: PathBuf,
    },
    Visit(String),
    Viewport(u32, u32),
    IgnoreExceptions,
}

pub struct FakeState {
    nodes: Vec<FakeNode>,
    next_id: u64,
    pub events: Vec<Event>,
    pub user_agent: String,
    pub active_class: String,
    pub window_width: f64,
    pub frames_ready: bool,
}

impl FakeState {
    /// Append a visible, connected node matching `selector` in the top frame.
    pub fn add(&mut self, selector: &str) -> &mut FakeNode {
        self.next_id += 1;
        self.nodes.push(FakeNode {
            id: self.next_id,
            scope: FrameScope::Top,
            selectors: vec![selector.to_string()],
            text: String::new(),
            attrs: HashMap::new(),
            classes: Vec::new(),
            visible: true,
            rect: Rect::new(10.0, 10.0, 110.0, 30.0),
            connected: true,
            children: HashMap::new(),
            pixels: Vec::new(),
        });
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    /// First connected node registered under `selector`.
    pub fn node(&mut self, selector: &str) -> &mut FakeNode {
        self.nodes
            .iter_mut()
            .find(|n| n.connected && n.selectors.iter().any(|s| s == selector))
            .unwrap_or_else(|| panic!("no fake node {selector}"))
    }

    /// Detach every node registered under `selector`.
    pub fn remove(&mut self, selector: &str) {
        for node in &mut self.nodes {
            if node.selectors.iter().any(|s| s == selector) {
                node.connected = false;
            }
        }
    }

    /// Re-render: detach the node and insert an identical one with a new id.
    pub fn replace(&mut self, selector: &str) -> u64 {
        let mut copy = self.node(selector).clone();
        self.remove(selector);
        self.next_id += 1;
        copy.id = self.next_id;
        copy.connected = true;
        self.nodes.push(copy);
        self.next_id
    }

    pub fn count(&self, selector: &str) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.connected && n.selectors.iter().any(|s| s == selector))
            .count()
    }

    fn by_id(&self, element: &ElementHandle) -> Result<&FakeNode, E2eError> {
        let node = self
            .nodes
            .iter()
            .find(|n| n.id == element.id)
            .ok_or_else(|| E2eError::ElementNotFound(element.to_string()))?;
        if !node.connected {
            return Err(E2eError::ElementDetached(element.to_string()));
        }
        Ok(node)
    }

    fn by_id_mut(&mut self, element: &ElementHandle) -> Result<&mut FakeNode, E2eError> {
        self.by_id(element)?;
        self.nodes
            .iter_mut()
            .find(|n| n.id == element.id)
            .ok_or_else(|| E2eError::ElementNotFound(element.to_string()))
    }
}

type Hook = Box<dyn FnMut(&Event, &mut FakeState) + Send>;
type Change = Box<dyn FnOnce(&mut FakeState) + Send>;

pub struct FakeBrowser {
    state: Mutex<FakeState>,
    hooks: Mutex<Vec<Hook>>,
    schedule: Mutex<Vec<(Instant, Change)>>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                nodes: Vec::new(),
                next_id: 0,
                events: Vec::new(),
                user_agent: "cypress".to_string(),
                active_class: "clipboard".to_string(),
                window_width: 1000.0,
                frames_ready: true,
            }),
            hooks: Mutex::new(Vec::new()),
            schedule: Mutex::new(Vec::new()),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        self.advance();
        f(&mut self.state.lock().unwrap())
    }

    /// Apply `change` once `delay` has passed on the tokio clock.
    pub fn after(&self, delay: Duration, change: impl FnOnce(&mut FakeState) + Send + 'static) {
        self.schedule
            .lock()
            .unwrap()
            .push((Instant::now() + delay, Box::new(change)));
    }

    /// React to helper actions.
    pub fn on_event(&self, hook: impl FnMut(&Event, &mut FakeState) + Send + 'static) {
        self.hooks.lock().unwrap().push(Box::new(hook));
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    fn advance(&self) {
        let now = Instant::now();
        let mut due = {
            let mut schedule = self.schedule.lock().unwrap();
            let (due, pending): (Vec<_>, Vec<_>) =
                schedule.drain(..).partition(|(at, _)| *at <= now);
            *schedule = pending;
            due
        };
        due.sort_by_key(|(at, _)| *at);
        let mut state = self.state.lock().unwrap();
        for (_, change) in due {
            change(&mut state);
        }
    }

    fn read<R>(
        &self,
        element: &ElementHandle,
        f: impl FnOnce(&FakeNode) -> R,
    ) -> Result<R, E2eError> {
        self.advance();
        let state = self.state.lock().unwrap();
        Ok(f(state.by_id(element)?))
    }

    fn record(&self, event: Event) {
        self.advance();
        let mut hooks = self.hooks.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        for hook in hooks.iter_mut() {
            hook(&event, &mut state);
        }
        state.events.push(event);
    }
}

/// Key strokes written back as a brace-escaped sequence.
fn keys_text(keys: &[KeyStroke]) -> String {
    keys.iter().map(ToString::to_string).collect()
}

#[async_trait::async_trait]
impl Browser for FakeBrowser {
    async fn query(
        &self,
        scope: FrameScope,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, E2eError> {
        self.advance();
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .iter()
            .filter(|n| n.matches(scope, locator))
            .map(|n| ElementHandle {
                id: n.id,
                epoch: 0,
                scope,
                selector: locator.selector.clone(),
            })
            .collect())
    }

    async fn is_detached(&self, element: &ElementHandle) -> Result<bool, E2eError> {
        self.advance();
        let state = self.state.lock().unwrap();
        Ok(!state
            .nodes
            .iter()
            .any(|n| n.id == element.id && n.connected))
    }

    async fn frame_ready(&self, _scope: FrameScope) -> Result<bool, E2eError> {
        Ok(self.with(|s| s.frames_ready))
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, E2eError> {
        self.read(element, |n| n.text.clone())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, E2eError> {
        self.read(element, |n| n.attrs.get(name).cloned())
    }

    async fn classes(&self, element: &ElementHandle) -> Result<Vec<String>, E2eError> {
        self.read(element, |n| n.classes.clone())
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, E2eError> {
        self.read(element, |n| n.visible)
    }

    async fn rect(&self, element: &ElementHandle) -> Result<Rect, E2eError> {
        self.read(element, |n| n.rect)
    }

    async fn child_count(
        &self,
        element: &ElementHandle,
        child_selector: &str,
    ) -> Result<usize, E2eError> {
        self.read(element, |n| {
            n.children.get(child_selector).copied().unwrap_or(0)
        })
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), E2eError> {
        self.read(element, |_| ())?;
        self.record(Event::Click(element.selector.clone()));
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), E2eError> {
        self.record(Event::ClickAt(x, y));
        Ok(())
    }

    async fn double_click_at(&self, x: f64, y: f64) -> Result<(), E2eError> {
        self.record(Event::DoubleClickAt(x, y));
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), E2eError> {
        self.advance();
        self.state
            .lock()
            .unwrap()
            .by_id_mut(element)?
            .attrs
            .remove("value");
        self.record(Event::Clear(element.selector.clone()));
        Ok(())
    }

    async fn type_keys(
        &self,
        element: &ElementHandle,
        keys: &[KeyStroke],
        force: bool,
    ) -> Result<(), E2eError> {
        let visible = self.read(element, |n| n.visible)?;
        if !force && !visible {
            return Err(E2eError::AssertionFailed(format!("{element} is not visible")));
        }
        self.record(Event::Type {
            selector: element.selector.clone(),
            keys: keys_text(keys),
            force,
        });
        Ok(())
    }

    async fn hide(&self, element: &ElementHandle) -> Result<(), E2eError> {
        self.advance();
        self.state.lock().unwrap().by_id_mut(element)?.visible = false;
        self.record(Event::Hide(element.selector.clone()));
        Ok(())
    }

    async fn attach_file(&self, element: &ElementHandle, path: &Path) -> Result<(), E2eError> {
        self.read(element, |_| ())?;
        self.record(Event::Attach {
            selector: element.selector.clone(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn pixel_data(
        &self,
        element: &ElementHandle,
        _source: PixelSource,
    ) -> Result<Vec<u8>, E2eError> {
        self.read(element, |n| n.pixels.clone())
    }

    async fn active_element_class(&self, _scope: FrameScope) -> Result<String, E2eError> {
        Ok(self.with(|s| s.active_class.clone()))
    }

    async fn window_width(&self, _scope: FrameScope) -> Result<f64, E2eError> {
        Ok(self.with(|s| s.window_width))
    }

    async fn user_agent(&self) -> Result<String, E2eError> {
        Ok(self.with(|s| s.user_agent.clone()))
    }

    async fn visit(&self, url: &str) -> Result<(), E2eError> {
        self.record(Event::Visit(url.to_string()));
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), E2eError> {
        self.record(Event::Viewport(width, height));
        Ok(())
    }

    async fn ignore_uncaught_exceptions(&self) -> Result<(), E2eError> {
        self.record(Event::IgnoreExceptions);
        Ok(())
    }
}
