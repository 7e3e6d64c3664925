//! Typed surface over the browser's automation object.

use crate::automation::events::BrowserEvent;
use crate::automation::native::{AutomationServer, Dispatch, LaunchOptions};
use crate::automation::unwrap::Unwrapped;
use crate::automation::variant::Variant;
use crate::config::schema::{AutomationConfig, WindowSettings};
use crate::error::{CrebassError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Optional arguments of `Navigate2`.
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    pub flags: Option<i64>,
    pub target_frame_name: Option<String>,
    pub post_data: Option<String>,
    pub headers: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshLevel {
    Normal = 0,
    IfExpired = 1,
    Completely = 3,
}

/// Read/write display properties, passed straight to the native object while
/// the browser is open.
macro_rules! properties {
    ($($get:ident, $set:ident: $name:literal => $ty:ty;)*) => {
        $(
            pub fn $get(&self) -> Result<$ty> {
                self.ensure_open()?;
                self.app.read($name)
            }

            pub fn $set(&self, value: $ty) -> Result<()> {
                self.ensure_open()?;
                self.app.set($name, value)
            }
        )*
    };
}

macro_rules! readonly_properties {
    ($($get:ident: $name:literal => $ty:ty;)*) => {
        $(
            pub fn $get(&self) -> Result<$ty> {
                self.ensure_open()?;
                self.app.read($name)
            }
        )*
    };
}

pub struct Browser {
    server: Arc<dyn AutomationServer>,
    app: Unwrapped,
    closed: AtomicBool,
    events: broadcast::Sender<BrowserEvent>,
}

impl Browser {
    /// Create the automation object for the configured application.
    pub fn launch(server: Arc<dyn AutomationServer>, config: &AutomationConfig) -> Result<Self> {
        let options = LaunchOptions {
            activate: config.activate,
            asynchronous: config.asynchronous,
        };
        let object = server.create(&config.prog_id, &options)?;
        tracing::info!("Created automation object {}", config.prog_id);
        Ok(Self::attach(server, object))
    }

    /// Wrap an already created automation object.
    pub fn attach(server: Arc<dyn AutomationServer>, object: Arc<dyn Dispatch>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            server,
            app: Unwrapped::new(object),
            closed: AtomicBool::new(false),
            events,
        }
    }

    pub fn raw(&self) -> &Arc<dyn Dispatch> {
        self.app.raw()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CrebassError::Closed);
        }
        Ok(())
    }

    properties! {
        visible, set_visible: "Visible" => bool;
        menu_bar, set_menu_bar: "MenuBar" => bool;
        tool_bar, set_tool_bar: "ToolBar" => i64;
        address_bar, set_address_bar: "AddressBar" => bool;
        status_bar, set_status_bar: "StatusBar" => bool;
        full_screen, set_full_screen: "FullScreen" => bool;
        theater_mode, set_theater_mode: "TheaterMode" => bool;
        resizable, set_resizable: "Resizable" => bool;
        silent, set_silent: "Silent" => bool;
        offline, set_offline: "Offline" => bool;
        register_as_browser, set_register_as_browser: "RegisterAsBrowser" => bool;
        register_as_drop_target, set_register_as_drop_target: "RegisterAsDropTarget" => bool;
        width, set_width: "Width" => i64;
        height, set_height: "Height" => i64;
        left, set_left: "Left" => i64;
        top, set_top: "Top" => i64;
    }

    readonly_properties! {
        busy: "Busy" => bool;
        ready_state: "ReadyState" => i64;
        location_url: "LocationURL" => String;
        location_name: "LocationName" => String;
        full_name: "FullName" => String;
        path: "Path" => String;
        name: "Name" => String;
    }

    /// Apply the configured display properties.
    pub fn apply_window_settings(&self, settings: &WindowSettings) -> Result<()> {
        self.set_visible(settings.visible)?;
        self.set_menu_bar(settings.menu_bar)?;
        self.set_tool_bar(settings.tool_bar)?;
        if let Some(v) = settings.address_bar {
            self.set_address_bar(v)?;
        }
        if let Some(v) = settings.status_bar {
            self.set_status_bar(v)?;
        }
        if let Some(v) = settings.width {
            self.set_width(v)?;
        }
        if let Some(v) = settings.height {
            self.set_height(v)?;
        }
        Ok(())
    }

    /// The current top-level document, if one is loaded.
    pub fn document(&self) -> Result<Option<Unwrapped>> {
        self.ensure_open()?;
        self.app.handle("Document")
    }

    /// The current document's window.
    pub fn window(&self) -> Result<Option<Unwrapped>> {
        match self.document()? {
            Some(document) => window_of(&document),
            None => Ok(None),
        }
    }

    /// Run a script in the top-level document's global scope.
    pub fn exec_script(&self, code: &str) -> Result<()> {
        let window = self
            .window()?
            .ok_or_else(|| CrebassError::dispatch("Document", "no document loaded"))?;
        exec_script(&window, code)
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        tracing::info!("Navigate: {}", url);
        self.app.call("Navigate", &[Variant::from(url)])?;
        Ok(())
    }

    pub fn navigate2(&self, url: &str, options: NavigateOptions) -> Result<()> {
        self.ensure_open()?;
        tracing::info!("Navigate2: {}", url);
        self.app.call(
            "Navigate2",
            &[
                Variant::from(url),
                Variant::from(options.flags),
                Variant::from(options.target_frame_name),
                Variant::from(options.post_data),
                Variant::from(options.headers),
            ],
        )?;
        Ok(())
    }

    pub fn go_back(&self) -> Result<()> {
        self.invoke("GoBack")
    }

    pub fn go_forward(&self) -> Result<()> {
        self.invoke("GoForward")
    }

    pub fn go_home(&self) -> Result<()> {
        self.invoke("GoHome")
    }

    pub fn go_search(&self) -> Result<()> {
        self.invoke("GoSearch")
    }

    pub fn refresh(&self) -> Result<()> {
        self.invoke("Refresh")
    }

    pub fn refresh2(&self, level: RefreshLevel) -> Result<()> {
        self.ensure_open()?;
        self.app.call("Refresh2", &[Variant::Int(level as i64)])?;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.invoke("Stop")
    }

    /// Quit the browser, release the native object and broadcast `Closed`.
    /// Calling it again is a no-op.
    pub fn quit(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.app.call("Quit", &[]);
        self.server.release(self.app.raw());
        tracing::info!("Browser quit");
        let _ = self.events.send(BrowserEvent::Closed);
        result.map(|_| ())
    }

    fn invoke(&self, method: &str) -> Result<()> {
        self.ensure_open()?;
        self.app.call(method, &[])?;
        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.server.release(self.app.raw());
        }
    }
}

/// The window of a document (`defaultView`, or `parentWindow` on older engines).
pub fn window_of(document: &Unwrapped) -> Result<Option<Unwrapped>> {
    match document.handle("defaultView") {
        Ok(Some(window)) => Ok(Some(window)),
        _ => document.handle("parentWindow"),
    }
}

pub fn exec_script(window: &Unwrapped, code: &str) -> Result<()> {
    window.call("execScript", &[Variant::from(code)])?;
    Ok(())
}
