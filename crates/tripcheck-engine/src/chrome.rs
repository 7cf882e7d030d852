//! Chrome DevTools Protocol implementation of the driver traits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, GetAllCookiesParams, SetCookiesParams, TimeSinceEpoch,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tripcheck_core::AppConfig;

use crate::driver::{ContextLauncher, LaunchMode, NavigationContext, NavigationHandle};
use crate::error::DriverError;
use crate::session::SessionSnapshot;

const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;
const CLICK_TIMEOUT: Duration = Duration::from_secs(1);

/// Launches local Chrome/Chromium processes.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    no_sandbox: bool,
    user_agent: Option<String>,
}

impl ChromeLauncher {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            executable: config.chrome_path.clone(),
            no_sandbox: config.chrome_no_sandbox,
            user_agent: Some(config.user_agent.clone()).filter(|ua| !ua.trim().is_empty()),
        }
    }

    fn browser_config(&self, mode: LaunchMode) -> Result<BrowserConfig, DriverError> {
        let mut builder = BrowserConfig::builder()
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .arg("--disable-dev-shm-usage");
        if mode == LaunchMode::Interactive {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait]
impl ContextLauncher for ChromeLauncher {
    async fn launch(&self, mode: LaunchMode) -> Result<Box<dyn NavigationContext>, DriverError> {
        let config = self.browser_config(mode)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler error");
                }
            }
        });

        let control = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        tracing::info!(?mode, executable = ?self.executable, "browser launched");
        Ok(Box::new(ChromeContext {
            browser: Mutex::new(browser),
            control,
            handler_task: Some(handler_task),
        }))
    }
}

/// One Chrome process. All pages share its default browser context, so the
/// cookie jar restored through the control page applies to every page.
pub struct ChromeContext {
    browser: Mutex<Browser>,
    control: Page,
    handler_task: Option<JoinHandle<()>>,
}

fn cookie_param(cookie: Cookie) -> Result<CookieParam, DriverError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name)
        .value(cookie.value)
        .domain(cookie.domain)
        .path(cookie.path)
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if !cookie.session {
        builder = builder.expires(TimeSinceEpoch::new(cookie.expires));
    }
    if let Some(same_site) = cookie.same_site {
        builder = builder.same_site(same_site);
    }
    builder.build().map_err(DriverError::Session)
}

#[async_trait]
impl NavigationContext for ChromeContext {
    async fn open_page(&self) -> Result<Box<dyn NavigationHandle>, DriverError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Closed(e.to_string()))?;
        Ok(Box::new(ChromePage { page }))
    }

    async fn restore_session(&self, snapshot: &SessionSnapshot) -> Result<(), DriverError> {
        let cookies: Vec<Cookie> = serde_json::from_value(snapshot.as_value()["cookies"].clone())
            .map_err(|e| DriverError::Session(format!("unreadable cookie jar: {e}")))?;
        let count = cookies.len();
        let params = cookies
            .into_iter()
            .map(cookie_param)
            .collect::<Result<Vec<_>, _>>()?;

        self.control
            .execute(SetCookiesParams::new(params))
            .await
            .map_err(|e| DriverError::Session(e.to_string()))?;
        tracing::debug!(cookies = count, "session restored");
        Ok(())
    }

    async fn export_session(&self) -> Result<SessionSnapshot, DriverError> {
        let response = self
            .control
            .execute(GetAllCookiesParams::default())
            .await
            .map_err(|e| DriverError::Session(e.to_string()))?;
        let cookies = serde_json::to_value(&response.result.cookies)
            .map_err(|e| DriverError::Session(e.to_string()))?;
        Ok(SessionSnapshot::new(json!({ "cookies": cookies })))
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Closed(e.to_string()));
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "browser process wait failed");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        tracing::debug!("browser closed");
        closed
    }
}

pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl NavigationHandle for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation(e.to_string())),
            Err(_) => Err(DriverError::Timeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Closed(e.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let click = async {
            self.page.find_element(selector).await?.click().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(CLICK_TIMEOUT, click).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Click {
                selector: selector.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Click {
                selector: selector.to_string(),
                reason: format!("timed out after {}s", CLICK_TIMEOUT.as_secs()),
            }),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map(|_| ())
            .map_err(|e| DriverError::Screenshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Closed(e.to_string()))
    }
}
