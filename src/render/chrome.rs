use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{write_page, RenderedImage, Renderer};
use crate::error::RenderError;

/// Largest window side Chrome will reliably capture
const MAX_WINDOW_SIDE: u32 = 16384;

const SIZE_ATTRIBUTE: &str = "data-render-size";

/// Records the laid-out document size on `<html>` so `--dump-dom` reports it
const MEASURE_SCRIPT: &str = r#"<script>(function () {
  var root = document.documentElement;
  root.setAttribute("data-render-size", Math.ceil(root.scrollWidth) + "x" + Math.ceil(root.scrollHeight));
})();</script>"#;

/// Screenshots pages with a headless Chrome/Chromium executable.
///
/// Each render runs the browser twice: once with `--dump-dom` to measure the
/// page, then with a window large enough to hold all of it for `--screenshot`.
/// `window_size` is the minimum window.
pub struct ChromeRenderer {
    pub executable: PathBuf,
    pub output_dir: PathBuf,
    pub window_size: (u32, u32),
    pub timeout: Duration,
}

impl ChromeRenderer {
    fn command(&self, page_url: &str, window_size: (u32, u32), action: String) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg(format!("--window-size={},{}", window_size.0, window_size.1))
            .arg(action)
            .arg(page_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Run the browser to completion and return its stdout
    async fn run(&self, mut command: Command) -> Result<Vec<u8>, RenderError> {
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    /// Window that fits the whole page, never smaller than the configured one
    async fn measure(&self, page_url: &str) -> Result<(u32, u32), RenderError> {
        let dom = self
            .run(self.command(page_url, self.window_size, "--dump-dom".to_string()))
            .await?;

        let (min_width, min_height) = self.window_size;
        match parse_page_size(&String::from_utf8_lossy(&dom)) {
            Some((width, height)) => Ok((
                width.clamp(min_width, MAX_WINDOW_SIDE.max(min_width)),
                height.clamp(min_height, MAX_WINDOW_SIDE.max(min_height)),
            )),
            None => {
                log::warn!("Could not measure {}, using the configured window size", page_url);
                Ok(self.window_size)
            }
        }
    }

    async fn capture(&self, page: &Path) -> Result<RenderedImage, RenderError> {
        let page = tokio::fs::canonicalize(page).await?;
        let screenshot = page.with_extension("png");
        let page_url = format!("file://{}", page.display());

        let window_size = self.measure(&page_url).await?;
        log::debug!("Capturing {} at {}x{}", page_url, window_size.0, window_size.1);

        self.run(self.command(
            &page_url,
            window_size,
            format!("--screenshot={}", screenshot.display()),
        ))
        .await?;

        if !tokio::fs::try_exists(&screenshot).await? {
            return Err(RenderError::MissingOutput(screenshot));
        }

        Ok(RenderedImage {
            path: screenshot,
            content_type: "image/png".to_string(),
        })
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, html: &str) -> Result<RenderedImage, RenderError> {
        let page = write_page(&self.output_dir, &with_measure_script(html)).await?;

        let result = self.capture(&page).await;

        // The page is only an intermediate for the screenshot
        if let Err(e) = tokio::fs::remove_file(&page).await {
            log::warn!("Failed to remove {}: {}", page.display(), e);
        }

        result
    }
}

fn with_measure_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(end) => format!("{}{}\n{}", &html[..end], MEASURE_SCRIPT, &html[end..]),
        None => format!("{}\n{}", html, MEASURE_SCRIPT),
    }
}

/// Read `data-render-size="<w>x<h>"` back out of a dumped DOM
fn parse_page_size(dom: &str) -> Option<(u32, u32)> {
    let marker = format!("{}=\"", SIZE_ATTRIBUTE);
    let start = dom.find(&marker)? + marker.len();
    let value = &dom[start..start + dom[start..].find('"')?];
    let (width, height) = value.split_once('x')?;

    Some((width.parse().ok()?, height.parse().ok()?))
}
