//! Impress helpers: shapes, text edit mode and slides

use crate::errors::E2eError;
use crate::expect::wait_for_attempts;
use crate::locator::Locator;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

const OVERLAY_SHAPES: &str = ".leaflet-pane.leaflet-overlay-pane svg g.Page g";
const INSERT_SLIDE_BUTTON: &str = "#tb_presentation-toolbar_item_insertpage";

/// Click-and-check loops on shapes give up after this many rounds.
const SHAPE_ATTEMPTS: u32 = 25;
const SHAPE_ATTEMPT_INTERVAL: Duration = Duration::from_millis(200);

/// Way to step through the slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlideDirection {
    Next,
    Previous,
}

impl SlideDirection {
    pub fn button(self) -> &'static str {
        match self {
            SlideDirection::Next => "#tb_actionbar_item_next",
            SlideDirection::Previous => "#tb_actionbar_item_prev",
        }
    }
}

impl Session {
    pub async fn assert_not_in_text_edit_mode(&self) -> Result<(), E2eError> {
        info!("Verifying NO Text-Edit context.");
        self.expect(".leaflet-cursor.blinking-cursor")
            .not_to_exist()
            .await?;
        self.expect(".leaflet-cursor-container")
            .not_to_exist()
            .await?;
        self.assert_no_keyboard_input().await?;
        info!("NO Text-Edit context verified.");
        Ok(())
    }

    pub async fn assert_in_text_edit_mode(&self) -> Result<(), E2eError> {
        info!("Verifying Impress in Text-Edit context.");
        self.expect("#doc-clipboard-container").to_exist().await?;
        self.expect(".leaflet-interactive").to_exist().await?;
        self.expect(".leaflet-pane.leaflet-overlay-pane svg g")
            .to_exist()
            .await?;
        self.assert_cursor_and_focus().await?;
        info!("Impress Text-Edit context verified.");
        Ok(())
    }

    /// Type into the shape being edited and check the text comes back through
    /// the clipboard. `expected` defaults to `text`.
    #[instrument(skip(self))]
    pub async fn type_text_and_verify(
        &self,
        text: &str,
        expected: Option<&str>,
    ) -> Result<(), E2eError> {
        self.assert_in_text_edit_mode().await?;
        self.type_into_document(text).await?;
        self.assert_in_text_edit_mode().await?;
        self.select_all_text(true).await?;
        self.expect_text_for_clipboard(expected.unwrap_or(text))
            .await
    }

    /// The slide sorter shows one preview more than there are slides.
    pub async fn assert_number_of_slide_previews(&self, slides: usize) -> Result<(), E2eError> {
        self.expect("#slide-sorter .preview-frame")
            .to_have_length(slides + 1)
            .await
    }

    /// Click the middle of the single `selector` match.
    async fn click_center_of(&self, selector: &str, double: bool) -> Result<(), E2eError> {
        self.expect(selector).to_have_length(1).await?;
        let (x, y) = self.get(selector).await?.rect().await?.center();
        if double {
            self.browser().double_click_at(x, y).await
        } else {
            self.browser().click_at(x, y).await
        }
    }

    /// Select the text shape in the middle of the slide.
    pub async fn select_text_shape_in_the_center(&self) -> Result<(), E2eError> {
        info!("Selecting text shape - start.");
        self.click_center_of("#document-container", false).await?;
        self.expect(".leaflet-drag-transform-marker")
            .to_be_visible()
            .await?;
        self.expect(OVERLAY_SHAPES).to_exist().await?;
        info!("Selecting text shape - end.");
        Ok(())
    }

    /// Select the table in the middle of the slide.
    pub async fn select_table_in_the_center(&self) -> Result<(), E2eError> {
        info!("Selecting table - start.");
        self.click_center_of("#document-container", false).await?;
        self.expect(".leaflet-marker-icon.table-row-resize-marker")
            .to_be_visible()
            .await?;
        self.expect(OVERLAY_SHAPES).to_exist().await?;
        info!("Selecting table - end.");
        Ok(())
    }

    /// Click the top-left corner of the slide until no shape is selected.
    pub async fn remove_shape_selection(&self) -> Result<(), E2eError> {
        info!("Removing shape selection - start.");
        wait_for_attempts(
            SHAPE_ATTEMPTS,
            SHAPE_ATTEMPT_INTERVAL,
            "shape selection to go away",
            move || async move {
                let canvas = self.get(".leaflet-canvas-container canvas").await?;
                let rect = canvas.rect().await?;
                self.browser()
                    .click_at(rect.left + 10.0, rect.top + 10.0)
                    .await?;
                self.wait(Duration::from_secs(2)).await;
                let overlay = self.get(".leaflet-overlay-pane svg").await?;
                Ok(overlay.child_count("g").await? == 0)
            },
        )
        .await?;
        self.expect(".leaflet-drag-transform-marker")
            .not_to_exist()
            .await?;
        info!("Removing shape selection - end.");
        Ok(())
    }

    /// Deselect and reselect the shape in the center so the application
    /// sends a fresh SVG of it.
    pub async fn trigger_new_svg_for_shape_in_the_center(&self) -> Result<(), E2eError> {
        info!("Triggering new SVG for shape - start.");
        self.remove_shape_selection().await?;
        // Clicking again right away enters text edit mode.
        self.wait(Duration::from_millis(200)).await;
        self.select_text_shape_in_the_center().await?;
        info!("Triggering new SVG for shape - end.");
        Ok(())
    }

    /// With a shape selected, double click into it until the text cursor
    /// shows, then select all of its text.
    pub async fn select_text_of_shape(&self) -> Result<(), E2eError> {
        info!("Selecting text of shape - start.");
        wait_for_attempts(
            SHAPE_ATTEMPTS,
            SHAPE_ATTEMPT_INTERVAL,
            "text cursor in the shape",
            move || async move {
                self.click_center_of("svg g .leaflet-interactive", true)
                    .await?;
                self.wait(Duration::from_secs(2)).await;
                let overlay = self.get(".cursor-overlay").await?;
                Ok(overlay.child_count(".leaflet-cursor-container").await? != 0)
            },
        )
        .await?;
        self.expect(".leaflet-cursor.blinking-cursor")
            .to_exist()
            .await?;
        self.select_all_text(true).await?;
        info!("Selecting text of shape - end.");
        Ok(())
    }

    /// Enter text edit mode of the selected shape by double clicking just
    /// below its rotate handle.
    pub async fn dblclick_on_selected_shape(&self) -> Result<(), E2eError> {
        let handle = ".transform-handler--rotate";
        self.expect(handle).to_have_length(1).await?;
        let rect = self.get(handle).await?.rect().await?;
        let (x, _) = rect.center();
        self.browser().double_click_at(x, rect.bottom + 50.0).await?;
        self.expect(".leaflet-cursor.blinking-cursor")
            .to_exist()
            .await
    }

    /// Insert `count` new slides.
    #[instrument(skip(self))]
    pub async fn add_slide(&self, count: usize) -> Result<(), E2eError> {
        let query = self.query();
        query
            .wait_until_idle(&Locator::new(INSERT_SLIDE_BUTTON), None)
            .await?;
        for _ in 0..count {
            query
                .expect(INSERT_SLIDE_BUTTON)
                .not_to_have_class("disabled")
                .await?;
            query.get(INSERT_SLIDE_BUTTON).await?.click().await?;
        }
        Ok(())
    }

    /// Step `count` slides forward or back.
    #[instrument(skip(self))]
    pub async fn change_slide(
        &self,
        count: usize,
        direction: SlideDirection,
    ) -> Result<(), E2eError> {
        for _ in 0..count {
            self.get(direction.button()).await?.click().await?;
        }
        Ok(())
    }
}
