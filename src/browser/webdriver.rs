//! WebDriver-backed navigator
//!
//! This module drives a Chrome session through a WebDriver server
//! (chromedriver) using `thirtyfour`. Each worker gets its own session; the
//! server may be shared.

use crate::browser::navigator::{
    Locator, NavError, NavResult, PageNavigator, SessionFactory, WaitMode,
};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;

/// How often element queries re-check the DOM while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause between failed connection attempts to the WebDriver server
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A navigator backed by one WebDriver session
pub struct WebDriverNavigator {
    driver: Option<WebDriver>,
    ordinal: usize,
}

impl WebDriverNavigator {
    fn driver(&self) -> NavResult<&WebDriver> {
        self.driver.as_ref().ok_or_else(|| {
            NavError::SessionClosed(format!("session for worker {} already shut down", self.ordinal))
        })
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Css(selector) => By::Css(selector.as_str()),
        Locator::XPath(expression) => By::XPath(expression.as_str()),
    }
}

fn driver_error(err: WebDriverError) -> NavError {
    NavError::from_driver_message(err.to_string())
}

/// Maps a failed wait to `Timeout` unless the session itself went away
fn wait_error(err: WebDriverError, locator: &Locator, timeout: Duration) -> NavError {
    match driver_error(err) {
        closed @ NavError::SessionClosed(_) => closed,
        _ => NavError::Timeout {
            what: locator.to_string(),
            after: timeout,
        },
    }
}

#[async_trait]
impl PageNavigator for WebDriverNavigator {
    type Element = WebElement;

    async fn go(&mut self, url: &str) -> NavResult<()> {
        self.driver()?.goto(url).await.map_err(driver_error)
    }

    async fn wait(
        &mut self,
        locator: &Locator,
        mode: WaitMode,
        timeout: Duration,
    ) -> NavResult<Vec<WebElement>> {
        let query = self.driver()?.query(by(locator)).wait(timeout, POLL_INTERVAL);

        match mode {
            WaitMode::Present => query
                .first()
                .await
                .map(|element| vec![element])
                .map_err(|e| wait_error(e, locator, timeout)),
            WaitMode::AllPresent => query
                .all_from_selector_required()
                .await
                .map_err(|e| wait_error(e, locator, timeout)),
            WaitMode::Clickable => query
                .and_clickable()
                .first()
                .await
                .map(|element| vec![element])
                .map_err(|e| wait_error(e, locator, timeout)),
            WaitMode::Invisible => {
                let gone = query
                    .and_displayed()
                    .not_exists()
                    .await
                    .map_err(|e| wait_error(e, locator, timeout))?;
                if gone {
                    Ok(Vec::new())
                } else {
                    Err(NavError::Timeout {
                        what: format!("{} to disappear", locator),
                        after: timeout,
                    })
                }
            }
        }
    }

    async fn click(&mut self, element: &WebElement) -> NavResult<()> {
        element.click().await.map_err(driver_error)
    }

    async fn element_text(
        &mut self,
        element: &WebElement,
        child: Option<&Locator>,
    ) -> NavResult<String> {
        match child {
            Some(locator) => {
                let inner = element.find(by(locator)).await.map_err(driver_error)?;
                inner.text().await.map_err(driver_error)
            }
            None => element.text().await.map_err(driver_error),
        }
    }

    async fn current_markup(&mut self) -> NavResult<String> {
        self.driver()?.source().await.map_err(driver_error)
    }

    async fn go_back(&mut self) -> NavResult<()> {
        self.driver()?.back().await.map_err(driver_error)
    }

    async fn shutdown(&mut self) -> NavResult<()> {
        match self.driver.take() {
            Some(driver) => driver.quit().await.map_err(driver_error),
            None => Ok(()),
        }
    }
}

/// Opens Chrome sessions against a WebDriver server
pub struct WebDriverFactory {
    config: BrowserConfig,
}

impl WebDriverFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    type Navigator = WebDriverNavigator;

    async fn open(&self, ordinal: usize) -> NavResult<WebDriverNavigator> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in chrome_args(&self.config) {
            caps.add_arg(&arg).map_err(driver_error)?;
        }

        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match WebDriver::new(&self.config.webdriver_url, caps.clone()).await {
                Ok(driver) => {
                    tracing::debug!(
                        "Worker {} connected to {} (attempt {})",
                        ordinal,
                        self.config.webdriver_url,
                        attempt
                    );
                    return Ok(WebDriverNavigator {
                        driver: Some(driver),
                        ordinal,
                    });
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "Worker {} failed to connect to {} (attempt {}/{}): {}",
                        ordinal,
                        self.config.webdriver_url,
                        attempt,
                        attempts,
                        e
                    );
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(e) => return Err(driver_error(e)),
            }
        }
    }
}

/// Builds the Chrome command-line arguments for a session
pub fn chrome_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = Vec::new();

    if config.headless {
        args.push("--headless=new".to_string());
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push("--window-size=1920,1080".to_string());
    }

    if let Some(ref proxy) = config.proxy {
        args.push(format!("--proxy-server={}", proxy));
    }

    if let Some(ref user_agent) = config.user_agent {
        args.push(format!("--user-agent={}", user_agent));
    }

    args
}
