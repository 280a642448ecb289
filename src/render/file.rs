use std::path::PathBuf;

use async_trait::async_trait;

use super::{write_page, RenderedImage, Renderer};
use crate::error::RenderError;

/// Stores each page as an HTML file for hosts that display HTML directly
pub struct HtmlFileRenderer {
    output_dir: PathBuf,
}

impl HtmlFileRenderer {
    pub fn new(output_dir: PathBuf) -> Self {
        HtmlFileRenderer { output_dir }
    }
}

#[async_trait]
impl Renderer for HtmlFileRenderer {
    async fn render(&self, html: &str) -> Result<RenderedImage, RenderError> {
        let path = write_page(&self.output_dir, html).await?;
        log::debug!("Wrote page to {}", path.display());

        Ok(RenderedImage {
            path,
            content_type: "text/html".to_string(),
        })
    }
}
