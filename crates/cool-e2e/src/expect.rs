//! Retrying assertions
//!
//! An [`Expectation`] re-evaluates its predicate every [`RETRY_INTERVAL`]
//! until it holds or the query timeout elapses. Elements are re-resolved on
//! every attempt, so an assertion survives the node being re-rendered.

use crate::errors::E2eError;
use crate::frame::{Element, ScopedQuery};
use crate::locator::Locator;
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Delay between two attempts of a retrying query or assertion.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Assertions about the elements a locator matches.
#[derive(Clone)]
pub struct Expectation {
    query: ScopedQuery,
    locator: Locator,
}

impl Expectation {
    pub(crate) fn new(query: ScopedQuery, locator: Locator) -> Self {
        Self { query, locator }
    }

    /// Override the retry timeout for this assertion.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.query = self.query.with_timeout(timeout);
        self
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn retry<F, Fut>(&self, expectation: &str, mut check: F) -> Result<(), E2eError>
    where
        F: FnMut(Vec<Element>) -> Fut,
        Fut: Future<Output = Result<bool, E2eError>>,
    {
        let timeout = self.query.timeout();
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let outcome = match self.query.all(self.locator.clone()).await {
                Ok(elements) => check(elements).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(true) => {
                    debug!(locator = %self.locator, attempts, "expected {expectation}: ok");
                    return Ok(());
                }
                Ok(false) => {}
                // The node may be replaced between the query and the check.
                Err(e) if e.is_retryable() => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                warn!(locator = %self.locator, attempts, "expected {expectation}: failed");
                return Err(E2eError::AssertionFailed(format!(
                    "expected {} to {expectation} (timed out after {timeout:?})",
                    self.locator
                )));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    pub async fn to_exist(&self) -> Result<(), E2eError> {
        self.retry("exist", move |els| async move { Ok(!els.is_empty()) })
            .await
    }

    pub async fn not_to_exist(&self) -> Result<(), E2eError> {
        self.retry("not exist", move |els| async move { Ok(els.is_empty()) })
            .await
    }

    pub async fn to_have_length(&self, length: usize) -> Result<(), E2eError> {
        self.retry(&format!("have length {length}"), move |els| async move {
            Ok(els.len() == length)
        })
        .await
    }

    /// At least one match is visible.
    pub async fn to_be_visible(&self) -> Result<(), E2eError> {
        self.retry("be visible", move |els| async move {
            for el in &els {
                if el.is_visible().await? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
    }

    /// No match is visible. Holds when nothing matches.
    pub async fn not_to_be_visible(&self) -> Result<(), E2eError> {
        self.retry("not be visible", move |els| async move {
            for el in &els {
                if el.is_visible().await? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
        .await
    }

    pub async fn to_have_attr(&self, name: &str, value: &str) -> Result<(), E2eError> {
        self.retry(&format!("have attribute {name}={value:?}"), move |els| async move {
            match els.first() {
                Some(el) => Ok(el.attribute(name).await?.as_deref() == Some(value)),
                None => Ok(false),
            }
        })
        .await
    }

    /// The first match exists and its attribute is anything but `value`.
    pub async fn not_to_have_attr(&self, name: &str, value: &str) -> Result<(), E2eError> {
        self.retry(
            &format!("not have attribute {name}={value:?}"),
            move |els| async move {
                match els.first() {
                    Some(el) => Ok(el.attribute(name).await?.as_deref() != Some(value)),
                    None => Ok(false),
                }
            },
        )
        .await
    }

    pub async fn to_have_text(&self, text: &str) -> Result<(), E2eError> {
        self.retry(&format!("have text {text:?}"), move |els| async move {
            Ok(joined_text(&els).await?.as_deref() == Some(text))
        })
        .await
    }

    pub async fn not_to_have_text(&self, text: &str) -> Result<(), E2eError> {
        self.retry(&format!("not have text {text:?}"), move |els| async move {
            Ok(matches!(joined_text(&els).await?, Some(t) if t != text))
        })
        .await
    }

    pub async fn to_match_text(&self, pattern: &Regex) -> Result<(), E2eError> {
        self.retry(&format!("match /{pattern}/"), move |els| async move {
            Ok(matches!(joined_text(&els).await?, Some(t) if pattern.is_match(&t)))
        })
        .await
    }

    /// Some single match has text matching `pattern`.
    pub async fn to_contain_match(&self, pattern: &Regex) -> Result<(), E2eError> {
        self.retry(&format!("contain a match of /{pattern}/"), move |els| async move {
            for el in &els {
                if pattern.is_match(&el.text().await?) {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
    }

    pub async fn not_to_match_text(&self, pattern: &Regex) -> Result<(), E2eError> {
        self.retry(&format!("not match /{pattern}/"), move |els| async move {
            Ok(matches!(joined_text(&els).await?, Some(t) if !pattern.is_match(&t)))
        })
        .await
    }

    pub async fn to_have_class(&self, class: &str) -> Result<(), E2eError> {
        self.retry(&format!("have class {class:?}"), move |els| async move {
            match els.first() {
                Some(el) => el.has_class(class).await,
                None => Ok(false),
            }
        })
        .await
    }

    pub async fn not_to_have_class(&self, class: &str) -> Result<(), E2eError> {
        self.retry(&format!("not have class {class:?}"), move |els| async move {
            match els.first() {
                Some(el) => Ok(!el.has_class(class).await?),
                None => Ok(false),
            }
        })
        .await
    }
}

/// Retry an arbitrary predicate until it holds or `timeout` elapses.
///
/// `check` may also perform actions (click, then look at the result); it is
/// called again after [`RETRY_INTERVAL`] whenever it returns `Ok(false)` or a
/// retryable error.
pub async fn wait_for<F, Fut>(
    timeout: Duration,
    description: &str,
    mut check: F,
) -> Result<(), E2eError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E2eError>>,
{
    wait_for_value(timeout, description, move || {
        let attempt = check();
        async move { Ok(attempt.await?.then_some(())) }
    })
    .await
}

/// Like [`wait_for`], but hands back the value the first successful
/// attempt produced.
pub async fn wait_for_value<T, F, Fut>(
    timeout: Duration,
    description: &str,
    mut check: F,
) -> Result<T, E2eError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E2eError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match check().await {
            Ok(Some(value)) => {
                debug!(attempts, "{description}: ok");
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) if e.is_retryable() => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            warn!(attempts, "{description}: gave up");
            return Err(E2eError::Timeout(format!(
                "{description} did not happen within {timeout:?}"
            )));
        }
        tokio::time::sleep(RETRY_INTERVAL).await;
    }
}

/// Run `check` at most `attempts` times, `interval` apart, however long
/// each attempt takes.
pub async fn wait_for_attempts<F, Fut>(
    attempts: u32,
    interval: Duration,
    description: &str,
    mut check: F,
) -> Result<(), E2eError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E2eError>>,
{
    for attempt in 1..=attempts {
        match check().await {
            Ok(true) => {
                debug!(attempt, "{description}: ok");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) if e.is_retryable() => {}
            Err(e) => return Err(e),
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    warn!(attempts, "{description}: gave up");
    Err(E2eError::Timeout(format!(
        "{description} did not happen in {attempts} attempts"
    )))
}

/// Text of all matches concatenated, `None` when nothing matches.
async fn joined_text(elements: &[Element]) -> Result<Option<String>, E2eError> {
    if elements.is_empty() {
        return Ok(None);
    }
    let mut text = String::new();
    for el in elements {
        text.push_str(&el.text().await?);
    }
    Ok(Some(text))
}
