use std::time::Duration;

use anyhow::{anyhow, Context};
use thirtyfour::{prelude::*, ChromiumLikeCapabilities};

use crate::configuration::WebDriverSettings;

const CHROME_ARGS: [&str; 5] = [
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-notifications",
    "--blink-settings=imagesEnabled=false",
];

#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: String,
    pub source: String,
}

/// One browser session. Close it with [`Droid::quit`]; a session dropped without
/// quitting is closed on a background task.
pub struct Droid {
    driver: Option<WebDriver>,
}

impl Droid {
    pub async fn launch(settings: &WebDriverSettings) -> anyhow::Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.add_arg("--headless=new")?;
        }
        for arg in CHROME_ARGS {
            caps.add_arg(arg)?;
        }
        caps.add_arg(&format!(
            "--window-size={},{}",
            settings.window_width, settings.window_height
        ))?;
        caps.add_arg(&format!("--user-agent={}", settings.user_agent))?;
        if let Some(binary) = &settings.chrome_binary {
            caps.set_binary(binary)?;
        }

        let driver = WebDriver::new(&settings.server_url, caps)
            .await
            .with_context(|| format!("Failed to start browser at {}", settings.server_url))?;

        log::info!("Browser session started on {}", settings.server_url);
        Ok(Droid {
            driver: Some(driver),
        })
    }

    pub fn driver(&self) -> anyhow::Result<&WebDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| anyhow!("Browser session already closed"))
    }

    /// Navigates to `url` and returns whatever the page rendered. A load that runs past
    /// `page_load_timeout` is not an error: the partial page is returned.
    pub async fn open(
        &self,
        url: &str,
        page_load_timeout: Duration,
        settle: Duration,
    ) -> anyhow::Result<LoadedPage> {
        let driver = self.driver()?;
        driver.set_page_load_timeout(page_load_timeout).await?;

        if let Err(e) = driver.goto(url).await {
            log::warn!("Page load of {} did not complete: {:?}", url, e);
        }
        tokio::time::sleep(settle).await;

        let source = driver
            .source()
            .await
            .with_context(|| format!("Failed to read page source of {}", url))?;
        let current_url = match driver.current_url().await {
            Ok(current) => current.to_string(),
            Err(_) => url.to_string(),
        };

        Ok(LoadedPage {
            url: current_url,
            source,
        })
    }

    pub async fn quit(mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.quit().await {
                Ok(()) => log::info!("Browser session closed"),
                Err(e) => log::error!("Failed to close browser session: {:?}", e),
            }
        }
    }
}

impl Drop for Droid {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };

        log::warn!("Browser session dropped without quit, closing it in the background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = driver.quit().await {
                        log::error!("Failed to close dropped browser session: {:?}", e);
                    }
                });
            }
            Err(_) => log::error!("No runtime left to close the dropped browser session"),
        }
    }
}
