//! [`Browser`] over the Chrome DevTools Protocol
//!
//! Elements found by a query are registered in a table on the top-level
//! window (`window.top.__coolE2e`) and referred to by numeric id afterwards.
//! The same DOM node always maps to the same id, which is what the idle
//! poller relies on to notice re-rendering. The table only holds weak
//! references, and it is stamped with a random epoch when a page load
//! creates it, so a handle from before a navigation never resolves to a
//! node of the new page.

use crate::browser::{Browser, ElementHandle, PixelSource, Rect};
use crate::errors::E2eError;
use crate::frame::FrameScope;
use crate::keys::{Key, KeyStroke};
use crate::locator::Locator;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser as ChromeBrowser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Element registry and frame helpers, evaluated in front of every script.
const PRELUDE: &str = r#"
const R = (() => {
    const t = window.top;
    if (!t.__coolE2e) {
        const nodes = new Map();
        t.__coolE2e = {
            epoch: Math.floor(Math.random() * 2 ** 52) + 1,
            next: 1,
            nodes,
            ids: new WeakMap(),
            gone: new FinalizationRegistry(id => nodes.delete(id)),
        };
    }
    return t.__coolE2e;
})();
const docAt = (path) => {
    let d = window.top.document;
    for (const sel of path) {
        const f = d.querySelector(sel);
        if (!f || !f.contentDocument) return null;
        d = f.contentDocument;
    }
    return d;
};
const reg = (n) => {
    let id = R.ids.get(n);
    if (id === undefined) {
        id = R.next++;
        R.ids.set(n, id);
        R.nodes.set(id, new WeakRef(n));
        R.gone.register(n, id);
    }
    return id;
};
const lookup = (id, epoch) => {
    if (epoch !== R.epoch) return undefined;
    const ref = R.nodes.get(id);
    return ref && ref.deref();
};
const node = (id) => {
    const n = lookup(id, A.epoch);
    if (!n) throw new Error('unknown element ' + id);
    return n;
};
const frameOffset = (n) => {
    let x = 0, y = 0;
    let w = n.ownerDocument.defaultView;
    while (w && w.frameElement) {
        const r = w.frameElement.getBoundingClientRect();
        x += r.left;
        y += r.top;
        w = w.parent;
    }
    return [x, y];
};
"#;

const QUERY: &str = r#"
const d = docAt(A.path);
if (!d) return { epoch: R.epoch, ids: [] };
let els = Array.from(d.querySelectorAll(A.selector));
if (A.content !== null) els = els.filter(e => (e.textContent || '').includes(A.content));
return { epoch: R.epoch, ids: els.map(reg) };
"#;

const IS_DETACHED: &str = r#"
const n = lookup(A.id, A.epoch);
return !n || !n.isConnected;
"#;

const FRAME_READY: &str = r#"
const d = docAt(A.path);
return !!(d && d.readyState === 'complete' && d.body);
"#;

const IS_VISIBLE: &str = r#"
const n = node(A.id);
if (!n.isConnected || n.getClientRects().length === 0) return false;
const s = n.ownerDocument.defaultView.getComputedStyle(n);
return s.visibility !== 'hidden' && s.display !== 'none';
"#;

const RECT: &str = r#"
const n = node(A.id);
const r = n.getBoundingClientRect();
const [x, y] = frameOffset(n);
return { left: r.left + x, top: r.top + y, right: r.right + x, bottom: r.bottom + y };
"#;

const CLEAR: &str = r#"
const n = node(A.id);
n.focus();
n.value = '';
n.dispatchEvent(new Event('input', { bubbles: true }));
return true;
"#;

const IMAGE_PIXELS: &str = r#"
const img = node(A.id);
const w = img.width - 2 * A.inset, h = img.height - 2 * A.inset;
if (w <= 0 || h <= 0) return [];
const c = img.ownerDocument.createElement('canvas');
c.width = img.width;
c.height = img.height;
const ctx = c.getContext('2d');
ctx.drawImage(img, 0, 0, img.width, img.height);
return Array.from(ctx.getImageData(A.inset, A.inset, w, h).data);
"#;

const CANVAS_PIXELS: &str = r#"
const c = node(A.id);
if (c.width === 0 || c.height === 0) return [];
return Array.from(c.getContext('2d').getImageData(0, 0, c.width, c.height).data);
"#;

const ACTIVE_CLASS: &str = r#"
const d = docAt(A.path);
const a = d && d.activeElement;
return a ? (a.getAttribute('class') || '') : '';
"#;

const SUPPRESS_ERRORS: &str = r#"
window.addEventListener('error', e => e.preventDefault());
window.addEventListener('unhandledrejection', e => e.preventDefault());
"#;

/// Launch options for [`CdpBrowser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub headless: bool,
    pub no_sandbox: bool,
    pub chrome_executable: Option<PathBuf>,
    /// Decides between the desktop and mobile client: `cypress` or
    /// `cypress-mobile`.
    pub user_agent: String,
    pub window_size: (u32, u32),
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: false,
            chrome_executable: None,
            user_agent: "cypress".to_string(),
            window_size: (1000, 660),
        }
    }
}

/// A Chrome instance with a single page driven over DevTools.
pub struct CdpBrowser {
    browser: Mutex<ChromeBrowser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl CdpBrowser {
    /// Start Chrome and open a blank page.
    #[instrument(skip(config), fields(user_agent = %config.user_agent))]
    pub async fn launch(config: CdpConfig) -> Result<Self, E2eError> {
        info!("Launching browser");
        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder().window_size(width, height);
        if !config.headless {
            builder = builder.with_head();
        }
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(E2eError::Browser)?;

        let (browser, handler) = ChromeBrowser::launch(browser_config).await?;
        Self::start(browser, handler, &config.user_agent).await
    }

    /// Attach to a running Chrome through its DevTools websocket URL.
    #[instrument]
    pub async fn connect(ws_url: &str, user_agent: &str) -> Result<Self, E2eError> {
        let (browser, handler) = ChromeBrowser::connect(ws_url).await?;
        Self::start(browser, handler, user_agent).await
    }

    async fn start(
        browser: ChromeBrowser,
        mut handler: chromiumoxide::Handler,
        user_agent: &str,
    ) -> Result<Self, E2eError> {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("DevTools handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await?;
        debug!("Browser page ready");

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    /// Close Chrome and wait for the process to exit.
    pub async fn close(self) -> Result<(), E2eError> {
        let mut browser = self.browser.lock().await;
        browser.close().await?;
        browser.wait().await?;
        Ok(())
    }

    fn script(body: &str, args: &Value) -> String {
        format!("(() => {{ const A = {args}; {PRELUDE} {body} }})()")
    }

    async fn eval<T: DeserializeOwned>(&self, body: &str, args: Value) -> Result<T, E2eError> {
        let params = EvaluateParams::builder()
            .expression(Self::script(body, &args))
            .return_by_value(true)
            .build()
            .map_err(E2eError::Browser)?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.into_value()?)
    }

    /// Script arguments naming `element`, merged with `extra`.
    fn element_args(element: &ElementHandle, extra: Value) -> Value {
        let mut args = json!({ "id": element.id, "epoch": element.epoch });
        if let (Value::Object(args), Value::Object(extra)) = (&mut args, extra) {
            args.extend(extra);
        }
        args
    }

    /// Evaluate a script about one element. A node that is gone, or that
    /// belongs to an earlier page load, surfaces as `ElementDetached`.
    async fn eval_element<T: DeserializeOwned>(
        &self,
        element: &ElementHandle,
        body: &str,
        extra: Value,
    ) -> Result<T, E2eError> {
        self.eval(body, Self::element_args(element, extra))
            .await
            .map_err(|e| match e {
                E2eError::Browser(msg) if msg.contains("unknown element") => {
                    E2eError::ElementDetached(element.to_string())
                }
                other => other,
            })
    }

    async fn mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        click_count: i64,
    ) -> Result<(), E2eError> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
        if click_count > 0 {
            builder = builder.button(MouseButton::Left).click_count(click_count);
        }
        self.page
            .execute(builder.build().map_err(E2eError::Browser)?)
            .await?;
        Ok(())
    }

    async fn press(&self, stroke: &KeyStroke) -> Result<(), E2eError> {
        let modifiers = stroke.modifiers.bits();
        let chorded = stroke.modifiers.ctrl || stroke.modifiers.alt || stroke.modifiers.meta;

        let mut down = DispatchKeyEventParams::builder().modifiers(modifiers);
        let mut up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .modifiers(modifiers);
        match stroke.key {
            Key::Char(c) => {
                let key = c.to_string();
                if c.is_ascii_alphabetic() {
                    let code = format!("Key{}", c.to_ascii_uppercase());
                    let vk = c.to_ascii_uppercase() as i64;
                    down = down.code(code.clone()).windows_virtual_key_code(vk);
                    up = up.code(code).windows_virtual_key_code(vk);
                }
                down = down.key(key.clone());
                up = up.key(key.clone());
                down = if chorded {
                    down.r#type(DispatchKeyEventType::RawKeyDown)
                } else {
                    down.r#type(DispatchKeyEventType::KeyDown).text(key)
                };
            }
            Key::Named(named) => {
                let name = named.key_name();
                let vk = named.virtual_key_code();
                down = down
                    .key(name)
                    .code(name)
                    .windows_virtual_key_code(vk)
                    .r#type(DispatchKeyEventType::KeyDown);
                up = up.key(name).code(name).windows_virtual_key_code(vk);
                if let Some(text) = named.text() {
                    down = down.text(text);
                }
            }
        }

        self.page
            .execute(down.build().map_err(E2eError::Browser)?)
            .await?;
        self.page
            .execute(up.build().map_err(E2eError::Browser)?)
            .await?;
        Ok(())
    }
}

impl Drop for CdpBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[derive(Deserialize)]
struct QueryResult {
    epoch: u64,
    ids: Vec<u64>,
}

#[derive(Deserialize)]
struct JsRect {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

#[async_trait::async_trait]
impl Browser for CdpBrowser {
    async fn query(
        &self,
        scope: FrameScope,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, E2eError> {
        let found: QueryResult = self
            .eval(
                QUERY,
                json!({
                    "path": scope.frame_path(),
                    "selector": locator.selector,
                    "content": locator.content,
                }),
            )
            .await?;
        let epoch = found.epoch;
        Ok(found
            .ids
            .into_iter()
            .map(|id| ElementHandle {
                id,
                epoch,
                scope,
                selector: locator.selector.clone(),
            })
            .collect())
    }

    async fn is_detached(&self, element: &ElementHandle) -> Result<bool, E2eError> {
        self.eval(IS_DETACHED, Self::element_args(element, json!({})))
            .await
    }

    async fn frame_ready(&self, scope: FrameScope) -> Result<bool, E2eError> {
        self.eval(FRAME_READY, json!({ "path": scope.frame_path() }))
            .await
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, E2eError> {
        self.eval_element(element, "return node(A.id).textContent || '';", json!({}))
            .await
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, E2eError> {
        self.eval_element(
            element,
            "return node(A.id).getAttribute(A.name);",
            json!({ "name": name }),
        )
        .await
    }

    async fn classes(&self, element: &ElementHandle) -> Result<Vec<String>, E2eError> {
        self.eval_element(element, "return Array.from(node(A.id).classList);", json!({}))
            .await
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, E2eError> {
        self.eval_element(element, IS_VISIBLE, json!({})).await
    }

    async fn rect(&self, element: &ElementHandle) -> Result<Rect, E2eError> {
        let r: JsRect = self.eval_element(element, RECT, json!({})).await?;
        Ok(Rect::new(r.left, r.top, r.right, r.bottom))
    }

    async fn child_count(
        &self,
        element: &ElementHandle,
        child_selector: &str,
    ) -> Result<usize, E2eError> {
        self.eval_element(
            element,
            "return Array.from(node(A.id).children).filter(c => c.matches(A.sel)).length;",
            json!({ "sel": child_selector }),
        )
        .await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), E2eError> {
        let _: bool = self
            .eval_element(
                element,
                "node(A.id).scrollIntoView({ block: 'center', inline: 'center' }); return true;",
                json!({}),
            )
            .await?;
        let (x, y) = self.rect(element).await?.center();
        self.click_at(x, y).await
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), E2eError> {
        debug!("Clicking at ({}, {})", x, y);
        self.mouse(DispatchMouseEventType::MouseMoved, x, y, 0).await?;
        self.mouse(DispatchMouseEventType::MousePressed, x, y, 1).await?;
        self.mouse(DispatchMouseEventType::MouseReleased, x, y, 1).await
    }

    async fn double_click_at(&self, x: f64, y: f64) -> Result<(), E2eError> {
        debug!("Double clicking at ({}, {})", x, y);
        self.mouse(DispatchMouseEventType::MouseMoved, x, y, 0).await?;
        for count in 1..=2 {
            self.mouse(DispatchMouseEventType::MousePressed, x, y, count)
                .await?;
            self.mouse(DispatchMouseEventType::MouseReleased, x, y, count)
                .await?;
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), E2eError> {
        let _: bool = self.eval_element(element, CLEAR, json!({})).await?;
        Ok(())
    }

    async fn type_keys(
        &self,
        element: &ElementHandle,
        keys: &[KeyStroke],
        force: bool,
    ) -> Result<(), E2eError> {
        if !force && !self.is_visible(element).await? {
            return Err(E2eError::AssertionFailed(format!(
                "cannot type into {element}: not visible"
            )));
        }
        let _: bool = self
            .eval_element(element, "node(A.id).focus(); return true;", json!({}))
            .await?;
        for stroke in keys {
            self.press(stroke).await?;
        }
        Ok(())
    }

    async fn hide(&self, element: &ElementHandle) -> Result<(), E2eError> {
        let _: bool = self
            .eval_element(
                element,
                "node(A.id).style.display = 'none'; return true;",
                json!({}),
            )
            .await?;
        Ok(())
    }

    async fn attach_file(&self, element: &ElementHandle, path: &Path) -> Result<(), E2eError> {
        let path = tokio::fs::canonicalize(path).await?;
        let expression = Self::script(
            "return node(A.id);",
            &Self::element_args(element, json!({})),
        );
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(false)
            .build()
            .map_err(E2eError::Browser)?;
        let object_id = self
            .page
            .execute(params)
            .await?
            .result
            .result
            .object_id
            .clone()
            .ok_or_else(|| E2eError::ElementDetached(element.to_string()))?;

        let upload = SetFileInputFilesParams::builder()
            .files(vec![path.to_string_lossy().into_owned()])
            .object_id(object_id)
            .build()
            .map_err(E2eError::Browser)?;
        self.page.execute(upload).await?;
        debug!(path = %path.display(), "Attached file to {}", element);
        Ok(())
    }

    async fn pixel_data(
        &self,
        element: &ElementHandle,
        source: PixelSource,
    ) -> Result<Vec<u8>, E2eError> {
        match source {
            PixelSource::Image { inset } => {
                self.eval_element(element, IMAGE_PIXELS, json!({ "inset": inset }))
                    .await
            }
            PixelSource::Canvas => self.eval_element(element, CANVAS_PIXELS, json!({})).await,
        }
    }

    async fn active_element_class(&self, scope: FrameScope) -> Result<String, E2eError> {
        self.eval(ACTIVE_CLASS, json!({ "path": scope.frame_path() }))
            .await
    }

    async fn window_width(&self, scope: FrameScope) -> Result<f64, E2eError> {
        self.eval(
            "const d = docAt(A.path); return (d ? d.defaultView : window).innerWidth;",
            json!({ "path": scope.frame_path() }),
        )
        .await
    }

    async fn user_agent(&self) -> Result<String, E2eError> {
        self.eval("return navigator.userAgent;", json!({})).await
    }

    #[instrument(skip(self))]
    async fn visit(&self, url: &str) -> Result<(), E2eError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), E2eError> {
        let params =
            SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false);
        self.page.execute(params).await?;
        Ok(())
    }

    async fn ignore_uncaught_exceptions(&self) -> Result<(), E2eError> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(SUPPRESS_ERRORS))
            .await?;
        self.page.evaluate_expression(SUPPRESS_ERRORS).await?;
        Ok(())
    }
}
