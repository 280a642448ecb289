pub mod chrome;
pub mod file;
pub mod html;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::models::RenderSettings;

pub use chrome::ChromeRenderer;
pub use file::HtmlFileRenderer;

/// A displayable artifact produced from an HTML page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedImage {
    pub path: PathBuf,
    pub content_type: String,
}

/// Converts an HTML page into something the chat platform can display
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<RenderedImage, RenderError>;
}

/// Build the renderer selected in settings
pub fn open(settings: &RenderSettings) -> Arc<dyn Renderer> {
    match settings {
        RenderSettings::Html { output_dir } => Arc::new(HtmlFileRenderer::new(output_dir.clone())),
        RenderSettings::Chrome {
            executable,
            output_dir,
            window_width,
            window_height,
            timeout_secs,
        } => Arc::new(ChromeRenderer {
            executable: executable.clone(),
            output_dir: output_dir.clone(),
            window_size: (*window_width, *window_height),
            timeout: Duration::from_secs(*timeout_secs),
        }),
    }
}

/// Write a page to `<dir>/<uuid>.html`, creating the directory if needed
pub(crate) async fn write_page(dir: &std::path::Path, html: &str) -> Result<PathBuf, RenderError> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(format!("{}.html", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, html).await?;

    Ok(path)
}
