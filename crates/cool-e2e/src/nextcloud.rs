//! Opening test documents through the Nextcloud integration
//!
//! Nextcloud serves the document application inside two nested iframes.
//! After the document is opened the session's frame scope is switched to
//! [`FrameScope::Leaflet`] so later queries land in the inner frame.

use crate::document::relative_path;
use crate::errors::E2eError;
use crate::expect::wait_for;
use crate::frame::{FrameScope, RICHDOCUMENTS_FRAME};
use crate::locator::file_row_selector;
use crate::session::Session;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const FILES_APP_URL: &str = "http://localhost/nextcloud/index.php/apps/files";

const TEST_USER: &str = "cypress_test";
const TEST_PASSWORD: &str = "cypress_test";

/// Upper bound for emptying the file list before an upload.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);

impl Session {
    /// Upload a test document into Nextcloud, then open it.
    #[instrument(skip(self))]
    pub async fn load_test_doc_nextcloud(
        &mut self,
        file_name: &str,
        sub_folder: Option<&str>,
        subsequent_load: bool,
    ) -> Result<(), E2eError> {
        info!("Loading test document with nextcloud - start.");

        // Nextcloud's own UI throws now and then; that must not fail the test.
        self.browser().ignore_uncaught_exceptions().await?;

        self.upload_file_to_nextcloud(file_name, sub_folder, subsequent_load)
            .await?;

        let top = self.top();
        top.get(&file_row_selector(file_name)).await?.click().await?;

        top.expect(RICHDOCUMENTS_FRAME)
            .within(self.env().long_command_timeout())
            .to_be_visible()
            .await?;

        self.wait(Duration::from_secs(10)).await;

        for scope in [FrameScope::RichDocuments, FrameScope::Leaflet] {
            let browser = self.browser().clone();
            wait_for(
                self.env().default_command_timeout(),
                &format!("frame {scope:?} to load"),
                move || {
                    let browser = browser.clone();
                    async move { browser.frame_ready(scope).await }
                },
            )
            .await?;
        }

        self.set_frame(FrameScope::Leaflet);

        info!("Loading test document with nextcloud - end.");
        Ok(())
    }

    /// Hide the first-run wizard Nextcloud shows on every headless login.
    pub async fn hide_first_run_wizard(&self) -> Result<(), E2eError> {
        // Give the wizard time to show up, if it is going to.
        self.wait(Duration::from_secs(2)).await;

        let top = self.top();
        if let Some(wizard) = top.all("#firstrunwizard").await?.into_iter().next() {
            debug!("Hiding first run wizard");
            wizard.hide().await?;
        }
        Ok(())
    }

    /// Log in as the test user.
    async fn log_in_to_nextcloud(&self) -> Result<(), E2eError> {
        let top = self.top();

        let user = top.get("input#user").await?;
        user.clear().await?;
        user.type_text(TEST_USER).await?;

        let password = top.get("input#password").await?;
        password.clear().await?;
        password.type_text(TEST_PASSWORD).await?;

        top.get("input#submit-form").await?.click().await?;

        top.expect(".button.new").to_be_visible().await
    }

    /// Delete every file in the list, one row at a time.
    async fn remove_all_files(&self) -> Result<(), E2eError> {
        let top = self.top();
        if top.count("#fileList tr").await? == 0 {
            return Ok(());
        }

        let top = &top;
        wait_for(CLEANUP_TIMEOUT, "file list to become empty", move || async move {
            top.get("#fileList tr:nth-of-type(1) .action-menu.permanent")
                .await?
                .click()
                .await?;
            top.get(".menuitem.action.action-delete.permanent")
                .await?
                .click()
                .await?;
            top.expect("#uploadprogressbar").not_to_be_visible().await?;
            Ok(top.count("#fileList tr").await? == 0)
        })
        .await
    }

    /// Upload `file_name` into the Nextcloud file list.
    ///
    /// On the first load of a test case this also logs in and empties the
    /// file list; `subsequent_load` skips both.
    #[instrument(skip(self))]
    pub async fn upload_file_to_nextcloud(
        &self,
        file_name: &str,
        sub_folder: Option<&str>,
        subsequent_load: bool,
    ) -> Result<(), E2eError> {
        info!("Uploading test document into nextcloud - start.");

        self.visit(FILES_APP_URL).await?;
        let top = self.top();

        if !subsequent_load {
            self.log_in_to_nextcloud().await?;
        }

        // Uploading before the free space is known fails.
        top.expect("#free_space").not_to_have_attr("value", "").await?;
        self.hide_first_run_wizard().await?;

        if !subsequent_load {
            self.remove_all_files().await?;
        }

        let row = file_row_selector(file_name);
        top.expect(row.as_str()).not_to_exist().await?;

        let device = self.device().await?.ok_or_else(|| {
            E2eError::UnsupportedOperation("upload from an unknown user agent".to_string())
        })?;
        let fixture = PathBuf::from(self.env().fixtures_folder())
            .join(device.fixture_folder())
            .join(relative_path(file_name, sub_folder));
        top.get("input#file_upload_start")
            .await?
            .attach_file(&fixture)
            .await?;

        top.expect("#uploadprogressbar").not_to_be_visible().await?;
        top.expect(row.as_str()).to_be_visible().await?;

        info!("Uploading test document into nextcloud - end.");
        Ok(())
    }
}
