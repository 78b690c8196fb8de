use crate::browser::Browser;
use crate::config::TestEnv;
use crate::errors::E2eError;
use crate::expect::Expectation;
use crate::frame::{Element, FrameScope, ScopedQuery};
use crate::locator::Locator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Per-test context threaded through every helper.
///
/// Holds the browser backend, the run configuration and the frame scope the
/// document application currently lives in.
pub struct Session {
    browser: Arc<dyn Browser>,
    env: TestEnv,
    frame: FrameScope,
}

impl Session {
    pub fn new(browser: Arc<dyn Browser>, env: TestEnv) -> Self {
        Self {
            browser,
            env,
            frame: FrameScope::Top,
        }
    }

    pub fn env(&self) -> &TestEnv {
        &self.env
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    pub fn frame(&self) -> FrameScope {
        self.frame
    }

    pub fn set_frame(&mut self, frame: FrameScope) {
        debug!(from = ?self.frame, to = ?frame, "Switching frame scope");
        self.frame = frame;
    }

    /// Queries against the current frame with the default command timeout.
    pub fn query(&self) -> ScopedQuery {
        ScopedQuery::new(
            self.browser.clone(),
            self.frame,
            self.env.default_command_timeout(),
        )
    }

    /// Queries against the top-level page regardless of the current frame.
    pub fn top(&self) -> ScopedQuery {
        self.query().in_scope(FrameScope::Top)
    }

    pub async fn get(&self, selector: &str) -> Result<Element, E2eError> {
        self.query().get(selector).await
    }

    pub fn expect(&self, locator: impl Into<Locator>) -> Expectation {
        self.query().expect(locator)
    }

    /// Fixed pause, for steps where the application gives no signal to wait on.
    pub async fn wait(&self, duration: Duration) {
        debug!(?duration, "Waiting");
        tokio::time::sleep(duration).await;
    }

    #[instrument(skip(self))]
    pub async fn visit(&self, url: &str) -> Result<(), E2eError> {
        self.browser.visit(url).await
    }
}
