//! Pixel checks on rendered images and canvases

use crate::browser::PixelSource;
use crate::errors::E2eError;
use crate::expect::wait_for;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Border ignored when sampling an `<img>`.
pub const IMAGE_BORDER: u32 = 2;

/// Expected state of the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelCheck {
    FullWhite,
    NotFullWhite,
}

impl PixelCheck {
    pub fn holds_for(self, rgba: &[u8]) -> bool {
        match self {
            PixelCheck::FullWhite => is_full_white(rgba),
            PixelCheck::NotFullWhite => !is_full_white(rgba),
        }
    }
}

/// Every channel of every pixel is 255. An empty buffer counts as white.
pub fn is_full_white(rgba: &[u8]) -> bool {
    rgba.iter().all(|&b| b == 255)
}

impl Session {
    #[instrument(skip(self))]
    pub async fn image_should_be_full_white_or_not(
        &self,
        selector: &str,
        check: PixelCheck,
    ) -> Result<(), E2eError> {
        self.pixels_should_be(
            selector,
            PixelSource::Image {
                inset: IMAGE_BORDER,
            },
            check,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn canvas_should_be_full_white_or_not(
        &self,
        selector: &str,
        check: PixelCheck,
    ) -> Result<(), E2eError> {
        self.pixels_should_be(selector, PixelSource::Canvas, check)
            .await
    }

    async fn pixels_should_be(
        &self,
        selector: &str,
        source: PixelSource,
        check: PixelCheck,
    ) -> Result<(), E2eError> {
        let query = self.query();
        let query = &query;
        wait_for(
            query.timeout(),
            &format!("{selector} to be {check:?}"),
            move || async move {
                let pixels = query.get(selector).await?.pixel_data(source).await?;
                debug!(bytes = pixels.len(), "Sampled pixels");
                Ok(check.holds_for(&pixels))
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_and_not_white() {
        assert!(is_full_white(&[255; 16]));
        assert!(!is_full_white(&[255, 255, 255, 255, 255, 254, 255, 255]));
        // A transparent black pixel is not white.
        assert!(PixelCheck::NotFullWhite.holds_for(&[0, 0, 0, 0]));
        assert!(PixelCheck::FullWhite.holds_for(&[]));
    }
}
