use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// URL opened once the browser is up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    /// Scripts evaluated in every document after the page agent, in order
    #[serde(default)]
    pub bootstrap: Vec<PathBuf>,

    /// Automation object to create
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Display properties applied after launch
    #[serde(default)]
    pub window: WindowSettings,

    /// Bridge installation timing
    #[serde(default)]
    pub bridge: BridgeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationConfig {
    /// Programmatic identifier of the automated application
    #[serde(default = "default_prog_id")]
    pub prog_id: String,

    #[serde(default = "default_true")]
    pub activate: bool,

    #[serde(default = "default_true", rename = "async")]
    pub asynchronous: bool,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            prog_id: default_prog_id(),
            activate: true,
            asynchronous: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowSettings {
    #[serde(default = "default_true")]
    pub visible: bool,

    #[serde(default)]
    pub menu_bar: bool,

    #[serde(default)]
    pub tool_bar: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_bar: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_bar: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            visible: true,
            menu_bar: false,
            tool_bar: 0,
            address_bar: None,
            status_bar: None,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    /// Pause between clearing a stale bridge and installing the new one
    #[serde(default = "default_settling_delay_ms")]
    pub settling_delay_ms: u64,

    /// How often the page agent re-arms its console interception
    #[serde(default = "default_console_rearm_ms")]
    pub console_rearm_ms: u64,

    /// Wait after subscribing to events before the first navigation
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Deadline for each bootstrap script; none by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_timeout_ms: Option<u64>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            settling_delay_ms: default_settling_delay_ms(),
            console_rearm_ms: default_console_rearm_ms(),
            startup_delay_ms: default_startup_delay_ms(),
            bootstrap_timeout_ms: None,
        }
    }
}

fn default_prog_id() -> String {
    "InternetExplorer.Application".to_string()
}

fn default_true() -> bool {
    true
}

fn default_settling_delay_ms() -> u64 {
    200
}

fn default_console_rearm_ms() -> u64 {
    1000
}

fn default_startup_delay_ms() -> u64 {
    1000
}
