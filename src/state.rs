use crate::automation::events::BrowserEvent;
use crate::automation::facade::{Browser, NavigateOptions};
use crate::automation::native::AutomationServer;
use crate::bridge::{CallBridge, HostBridge, PendingCalls};
use crate::config::{validate_config, AppConfig};
use crate::error::Result;
use crate::lifecycle::LifecycleController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Application global state
pub struct AppState {
    pub config: AppConfig,
    pub browser: Arc<Browser>,
    pub bridge: Arc<CallBridge>,
    pub host: Arc<HostBridge>,
    pub controller: Arc<LifecycleController>,
    event_loop: JoinHandle<()>,
}

impl AppState {
    /// Launch the browser, apply window settings and start reacting to its
    /// navigation events. Must be called inside a Tokio runtime.
    pub fn launch(server: Arc<dyn AutomationServer>, config: AppConfig) -> Result<Self> {
        validate_config(&config)?;

        let browser = Arc::new(Browser::launch(Arc::clone(&server), &config.automation)?);
        browser.apply_window_settings(&config.window)?;

        let calls = Arc::new(PendingCalls::new());
        let bridge = Arc::new(CallBridge::new(Arc::clone(&calls)));
        let host = Arc::new(HostBridge::new(calls));
        let controller = Arc::new(LifecycleController::new(
            Arc::clone(&bridge),
            Arc::clone(&host),
            &config.bridge,
            config.bootstrap.clone(),
        ));

        let (tx, rx) = mpsc::unbounded_channel();
        server.advise(browser.raw(), tx)?;
        let event_loop = tokio::spawn(Arc::clone(&controller).run(rx));

        Ok(Self {
            config,
            browser,
            bridge,
            host,
            controller,
            event_loop,
        })
    }

    /// Evaluate `code` in the top-level document.
    pub async fn evaluate(&self, code: &str) -> Result<serde_json::Value> {
        self.bridge.evaluate(code).await
    }

    /// Wait the start-up delay, then navigate to the configured start URL.
    pub async fn open_start_url(&self) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.config.bridge.startup_delay_ms)).await;
        if let Some(url) = &self.config.start_url {
            self.browser.navigate2(url, NavigateOptions::default())?;
        }
        Ok(())
    }

    /// Resolve once the browser has quit.
    pub async fn wait_closed(&self) {
        let mut events = self.browser.subscribe();
        if self.browser.is_closed() {
            return;
        }
        loop {
            match events.recv().await {
                Ok(BrowserEvent::Closed) | Err(broadcast::error::RecvError::Closed) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}
