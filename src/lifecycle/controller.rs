//! Reinstalls the bridge into every newly loaded document.

use crate::automation::events::{Frame, NavigationEvent};
use crate::automation::facade::{exec_script, window_of};
use crate::automation::native::Dispatch;
use crate::automation::unwrap::Unwrapped;
use crate::automation::variant::Variant;
use crate::bridge::agent::{PageAgent, BRIDGE_PROPERTY, INSTALL_MARKER, TEARDOWN_SCRIPT};
use crate::bridge::call::{BridgeState, CallBridge};
use crate::bridge::host::HostBridge;
use crate::bridge::pending::Generation;
use crate::config::schema::BridgeSettings;
use crate::error::{CrebassError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct LifecycleController {
    bridge: Arc<CallBridge>,
    host: Arc<HostBridge>,
    agent: PageAgent,
    bootstrap: Vec<PathBuf>,
    settling_delay: Duration,
    bootstrap_timeout: Option<Duration>,
}

impl LifecycleController {
    pub fn new(
        bridge: Arc<CallBridge>,
        host: Arc<HostBridge>,
        settings: &BridgeSettings,
        bootstrap: Vec<PathBuf>,
    ) -> Self {
        Self {
            bridge,
            host,
            agent: PageAgent::new(Duration::from_millis(settings.console_rearm_ms)),
            bootstrap,
            settling_delay: Duration::from_millis(settings.settling_delay_ms),
            bootstrap_timeout: settings.bootstrap_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Consume navigation events in delivery order until the source closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<NavigationEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!("Navigation event source closed");
    }

    /// Handle one event. A `NavigateComplete` starts a new generation for its
    /// frame immediately and returns the spawned installation task.
    pub fn handle(self: &Arc<Self>, event: NavigationEvent) -> Option<JoinHandle<()>> {
        match event {
            NavigationEvent::BeforeNavigate {
                frame,
                url,
                flags,
                target_frame_name,
                post_data,
                headers,
            } => {
                tracing::debug!(
                    "BeforeNavigate frame={} url={} flags={} target={} post={:?} headers={:?}",
                    frame.key(),
                    url,
                    flags,
                    target_frame_name,
                    post_data,
                    headers
                );
                None
            }
            NavigationEvent::NavigateComplete { frame, url } => {
                tracing::info!("NavigateComplete frame={} url={}", frame.key(), url);
                let generation = self.bridge.begin_document(&frame.key());
                let controller = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let key = frame.key();
                    if let Err(e) = controller.install(frame, generation).await {
                        tracing::error!(
                            "Bridge installation for frame {} (generation {}) failed: {}",
                            key,
                            generation.0,
                            e
                        );
                    }
                }))
            }
            NavigationEvent::DocumentComplete { frame, url } => {
                tracing::debug!("DocumentComplete frame={} url={}", frame.key(), url);
                None
            }
        }
    }

    async fn install(&self, frame: Frame, generation: Generation) -> Result<()> {
        let key = frame.key();
        if !self.bridge.is_current(&key, generation) {
            return self.superseded(&key, generation);
        }
        let browser = Unwrapped::new(Arc::clone(&frame.browser));
        let document = browser
            .handle("Document")?
            .ok_or_else(|| CrebassError::dispatch("Document", "no document loaded"))?;
        let window = window_of(&document)?
            .ok_or_else(|| CrebassError::dispatch("defaultView", "document has no window"))?;

        exec_script(&window, TEARDOWN_SCRIPT)?;
        if !self
            .bridge
            .advance(&key, generation, BridgeState::BridgeCleared, None)
        {
            return self.superseded(&key, generation);
        }

        tokio::time::sleep(self.settling_delay).await;
        if !self.bridge.is_current(&key, generation) {
            return self.superseded(&key, generation);
        }

        let host: Arc<dyn Dispatch> = self.host.clone();
        document.set(BRIDGE_PROPERTY, Variant::Object(host))?;
        exec_script(&window, &self.agent.script())?;

        let marker = document.value(INSTALL_MARKER)?;
        if marker.is_nothing() {
            return Err(CrebassError::dispatch(
                INSTALL_MARKER,
                "page agent did not install",
            ));
        }
        if !self
            .bridge
            .advance(&key, generation, BridgeState::AgentInstalled, Some(document))
        {
            return self.superseded(&key, generation);
        }
        tracing::info!("Page agent {} installed in frame {}", marker, key);

        for (index, path) in self.bootstrap.iter().enumerate() {
            if !self.bridge.is_current(&key, generation) {
                return self.superseded(&key, generation);
            }
            let name = script_name(path);
            match self.load_bootstrap(&key, path).await {
                Ok(result) => tracing::info!("#{} {} res {}", index + 1, name, result),
                Err(e) => tracing::error!("#{} {} error {}", index + 1, name, e),
            }
        }

        if !self
            .bridge
            .advance(&key, generation, BridgeState::BootstrapLoaded, None)
        {
            return self.superseded(&key, generation);
        }
        tracing::info!("Bootstrap complete in frame {}", key);
        Ok(())
    }

    async fn load_bootstrap(&self, frame: &str, path: &Path) -> Result<serde_json::Value> {
        let failed = |reason: String| CrebassError::BootstrapLoad {
            script: script_name(path),
            reason,
        };
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let evaluated = match self.bootstrap_timeout {
            Some(timeout) => {
                self.bridge
                    .evaluate_with_timeout(frame, &source, timeout)
                    .await
            }
            None => self.bridge.evaluate_in(frame, &source).await,
        };
        evaluated.map_err(|e| failed(e.to_string()))
    }

    fn superseded(&self, frame: &str, generation: Generation) -> Result<()> {
        tracing::debug!(
            "Installation of frame {} generation {} superseded",
            frame,
            generation.0
        );
        Ok(())
    }
}

fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
