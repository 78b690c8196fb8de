//! Typing into the document, selections, the clipboard and the text cursor

use crate::config::Integration;
use crate::document::DocType;
use crate::errors::E2eError;
use crate::expect::{wait_for, wait_for_value};
use crate::session::Session;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// The hidden textarea that receives keyboard input for the document.
pub const CLIPBOARD_TEXTAREA: &str = "textarea.clipboard";
/// The document's blinking text cursor.
pub const DEFAULT_CURSOR: &str = ".leaflet-overlay-pane .blinking-cursor";

const SELECTION_START: &str = ".leaflet-selection-marker-start";
const SELECTION_END: &str = ".leaflet-selection-marker-end";

/// Direction of a cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
}

impl Direction {
    pub fn key_name(self) -> &'static str {
        match self {
            Direction::Up => "{uparrow}",
            Direction::Down => "{downarrow}",
            Direction::Left => "{leftarrow}",
            Direction::Right => "{rightarrow}",
            Direction::Home => "{home}",
            Direction::End => "{end}",
        }
    }
}

/// Modifier held while moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorModifier {
    Ctrl,
    Shift,
}

/// Which coordinate of the cursor a movement changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Left,
    Top,
}

impl Axis {
    /// Axis that moves for `direction`: vertical moves and ctrl+home/end jump
    /// lines, everything else stays on the line.
    pub fn for_movement(direction: Direction, modifier: Option<CursorModifier>) -> Self {
        match (direction, modifier) {
            (Direction::Up | Direction::Down, _) => Axis::Top,
            (Direction::Home | Direction::End, Some(CursorModifier::Ctrl)) => Axis::Top,
            _ => Axis::Left,
        }
    }
}

/// Key sequence for one cursor movement, e.g. `{ctrl}{home}`.
pub fn movement_keys(direction: Direction, modifier: Option<CursorModifier>) -> String {
    let prefix = match modifier {
        Some(CursorModifier::Ctrl) => "{ctrl}",
        Some(CursorModifier::Shift) => "{shift}",
        None => "",
    };
    format!("{prefix}{}", direction.key_name())
}

/// Where the plain text of a copied selection shows up for each document
/// type. Writer wraps runs in `<font>` when they carry formatting.
fn clipboard_selectors(doc_type: DocType) -> (&'static str, Option<&'static str>) {
    match doc_type {
        DocType::Writer => ("#copy-paste-container p", Some("#copy-paste-container p font")),
        DocType::Calc | DocType::Impress => ("#copy-paste-container pre", None),
    }
}

impl Session {
    /// Type text or brace-escaped special keys into the document.
    #[instrument(skip(self))]
    pub async fn type_into_document(&self, text: &str) -> Result<(), E2eError> {
        info!("Typing into document - start.");
        self.get(CLIPBOARD_TEXTAREA)
            .await?
            .type_text_forced(text)
            .await?;
        info!("Typing into document - end.");
        Ok(())
    }

    /// Type into `selector` one character at a time, optionally pausing
    /// between characters. Typing whole strings at once sometimes inserts
    /// stray characters.
    #[instrument(skip(self))]
    pub async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), E2eError> {
        for ch in text.chars() {
            let single = if ch == '{' {
                "{{}".to_string()
            } else {
                ch.to_string()
            };
            self.get(selector).await?.type_text(&single).await?;
            if !delay.is_zero() {
                self.wait(delay).await;
            }
        }
        Ok(())
    }

    /// The document refuses keyboard input (on mobile: keyboard hidden).
    pub async fn assert_no_keyboard_input(&self) -> Result<(), E2eError> {
        self.expect(CLIPBOARD_TEXTAREA)
            .to_have_attr("data-accept-input", "false")
            .await
    }

    /// The document accepts keyboard input (on mobile: keyboard shown).
    pub async fn assert_have_keyboard_input(&self) -> Result<(), E2eError> {
        self.expect(CLIPBOARD_TEXTAREA)
            .to_have_attr("data-accept-input", "true")
            .await
    }

    /// A blinking cursor is shown and keyboard focus is on the document.
    pub async fn assert_cursor_and_focus(&self) -> Result<(), E2eError> {
        info!("Verifying Cursor and Focus - start");

        // The active element is not reachable across the Nextcloud frames.
        if self.env().integration != Integration::Nextcloud {
            let scope = self.frame();
            let browser = self.browser().clone();
            wait_for(
                self.env().default_command_timeout(),
                "clipboard textarea to have focus",
                move || {
                    let browser = browser.clone();
                    async move { Ok(browser.active_element_class(scope).await? == "clipboard") }
                },
            )
            .await?;
        }

        self.expect(".leaflet-cursor.blinking-cursor")
            .to_exist()
            .await?;
        self.expect(".leaflet-cursor-container").to_exist().await?;

        self.assert_have_keyboard_input().await?;

        info!("Verifying Cursor and Focus - end");
        Ok(())
    }

    /// Select all text with ctrl+A.
    pub async fn select_all_text(&self, assert_focus: bool) -> Result<(), E2eError> {
        info!("Select all text - start");
        if assert_focus {
            self.assert_cursor_and_focus().await?;
        }
        self.type_into_document("{ctrl}a").await?;
        self.text_selection_should_exist().await?;
        info!("Select all text - end");
        Ok(())
    }

    /// Select all text and delete it.
    pub async fn clear_all_text(&self) -> Result<(), E2eError> {
        info!("Clear all text - start");
        self.assert_cursor_and_focus().await?;
        self.type_into_document("{ctrl}a").await?;
        self.text_selection_should_exist().await?;
        self.type_into_document("{del}").await?;
        self.text_selection_should_not_exist().await?;
        info!("Clear all text - end");
        Ok(())
    }

    pub async fn text_selection_should_exist(&self) -> Result<(), E2eError> {
        info!("Make sure text selection exists - start.");
        self.expect(SELECTION_START).to_exist().await?;
        self.expect(SELECTION_END).to_exist().await?;
        // At least one of the markers must be on screen.
        self.expect(format!("{SELECTION_START}, {SELECTION_END}"))
            .to_be_visible()
            .await?;
        info!("Make sure text selection exists - end.");
        Ok(())
    }

    pub async fn text_selection_should_not_exist(&self) -> Result<(), E2eError> {
        info!("Make sure there is no text selection - start.");
        self.expect(SELECTION_START).not_to_exist().await?;
        self.expect(SELECTION_END).not_to_exist().await?;
        info!("Make sure there is no text selection - end.");
        Ok(())
    }

    /// The copied selection's plain text equals `expected`.
    #[instrument(skip(self))]
    pub async fn expect_text_for_clipboard(&self, expected: &str) -> Result<(), E2eError> {
        let Some(doc_type) = self.doc_type().await? else {
            debug!("Unknown document type, skipping clipboard check");
            return Ok(());
        };
        let (plain, formatted) = clipboard_selectors(doc_type);
        let selector = match formatted {
            Some(formatted) if self.query().exists(formatted).await? => formatted,
            _ => plain,
        };
        self.expect(selector).to_have_text(expected).await
    }

    /// Some copied run or paragraph has text matching `pattern`.
    #[instrument(skip(self))]
    pub async fn match_clipboard_text(&self, pattern: &Regex) -> Result<(), E2eError> {
        let Some(doc_type) = self.doc_type().await? else {
            debug!("Unknown document type, skipping clipboard check");
            return Ok(());
        };
        let (plain, formatted) = clipboard_selectors(doc_type);
        self.expect(formatted.unwrap_or(plain))
            .to_contain_match(pattern)
            .await
    }

    /// Current cursor offset along `axis`. Fails unless it is positive.
    pub async fn cursor_pos(&self, axis: Axis, cursor_selector: &str) -> Result<f64, E2eError> {
        let query = self.query();
        let query = &query;
        wait_for_value(
            query.timeout(),
            &format!("cursor {cursor_selector} to have a position"),
            move || async move {
                let rect = query.get(cursor_selector).await?.rect().await?;
                let pos = match axis {
                    Axis::Left => rect.left,
                    Axis::Top => rect.top,
                };
                Ok((pos > 0.0).then_some(pos))
            },
        )
        .await
    }

    /// Move the text cursor and wait until it actually moved.
    #[instrument(skip(self))]
    pub async fn move_cursor(
        &self,
        direction: Direction,
        modifier: Option<CursorModifier>,
        check_visibility: bool,
        cursor_selector: &str,
    ) -> Result<(), E2eError> {
        info!("Moving text cursor - start.");

        let axis = Axis::for_movement(direction, modifier);
        let original = self.cursor_pos(axis, cursor_selector).await?;
        debug!(?axis, original, "Original cursor position");

        self.type_into_document(&movement_keys(direction, modifier))
            .await?;

        let query = self.query();
        let query = &query;
        wait_for(
            query.timeout(),
            &format!("cursor to leave {axis:?} = {original}"),
            move || async move {
                let rect = query.get(cursor_selector).await?.rect().await?;
                let now = match axis {
                    Axis::Left => rect.left,
                    Axis::Top => rect.top,
                };
                Ok(now != original)
            },
        )
        .await?;

        // The view follows the cursor, so it must still be on screen.
        if check_visibility {
            self.expect(cursor_selector).to_be_visible().await?;
        }

        info!("Moving text cursor - end.");
        Ok(())
    }
}
