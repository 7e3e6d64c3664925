//! Fake automation runtime shared by the integration tests.
//!
//! `FakeBrowser` stands in for the browser's automation object. Each loaded
//! `FakeDocument` imitates what the injected page agent does: `execScript` of
//! the agent defines the entry point and install marker, the teardown script
//! clears them, and calls to the entry point are answered through the host
//! bridge `resolve` method, immediately or on demand when deferred.

#![allow(dead_code)]

use crebass_lib::automation::{
    AutomationServer, Dispatch, Frame, LaunchOptions, MemberInfo, NavigationEvent, Variant,
};
use crebass_lib::bridge::agent::{
    AGENT_VERSION, BRIDGE_PROPERTY, CONSOLE_MARKER, ENTRY_POINT, ERROR_MARKER, INSTALL_MARKER,
};
use crebass_lib::bridge::{BridgeState, CallBridge};
use crebass_lib::error::{CrebassError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

pub type Evaluator = dyn Fn(&str) -> std::result::Result<Value, Value> + Send + Sync;

/// Evaluates a tiny subset of JavaScript: `1+1`, `throw new Error('msg')` and
/// JSON literals. Anything else evaluates to `undefined` (reported as null).
pub fn canned_evaluator(code: &str) -> std::result::Result<Value, Value> {
    let code = code.trim();
    if code == "1+1" {
        return Ok(json!(2));
    }
    if let Some(rest) = code.strip_prefix("throw new Error(") {
        let message = rest
            .trim_end_matches(';')
            .trim_end_matches(')')
            .trim_matches(|c| c == '\'' || c == '"');
        return Err(json!({ "name": "Error", "message": message }));
    }
    Ok(serde_json::from_str(code).unwrap_or(Value::Null))
}

pub struct FakeDocument {
    url: String,
    props: Mutex<HashMap<String, Variant>>,
    entry_point: AtomicBool,
    deferred: AtomicBool,
    queued: Mutex<Vec<(u64, String)>>,
    evaluated: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    window: Arc<FakeWindow>,
    evaluator: Arc<Evaluator>,
}

impl FakeDocument {
    pub fn new(url: &str, evaluator: Arc<Evaluator>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            url: url.to_string(),
            props: Mutex::new(HashMap::new()),
            entry_point: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
            queued: Mutex::new(Vec::new()),
            evaluated: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            window: Arc::new(FakeWindow {
                document: weak.clone(),
            }),
            evaluator,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn prop(&self, name: &str) -> Variant {
        self.props.lock().get(name).cloned().unwrap_or(Variant::Empty)
    }

    pub fn is_installed(&self) -> bool {
        !self.prop(INSTALL_MARKER).is_nothing()
    }

    pub fn has_host_bridge(&self) -> bool {
        self.prop(BRIDGE_PROPERTY).is_object()
    }

    /// Hold entry point calls until `answer` is called.
    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::SeqCst);
    }

    pub fn queued_ids(&self) -> Vec<u64> {
        self.queued.lock().iter().map(|(id, _)| *id).collect()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.lock().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    /// Answer a deferred call.
    pub fn answer(&self, id: u64) {
        let code = {
            let mut queued = self.queued.lock();
            let index = queued
                .iter()
                .position(|(queued_id, _)| *queued_id == id)
                .expect("call was not queued");
            queued.remove(index).1
        };
        self.report(id, &code);
    }

    /// Report an arbitrary encoded result for `id`, as a misbehaving page might.
    pub fn report_raw(&self, id: u64, encoded: &str) {
        if let Variant::Object(host) = self.prop(BRIDGE_PROPERTY) {
            host.call("resolve", &[Variant::from(id), Variant::from(encoded)])
                .expect("host resolve never fails");
        }
    }

    fn report(&self, id: u64, code: &str) {
        self.evaluated.lock().push(code.to_string());
        let encoded = match (self.evaluator)(code) {
            Ok(value) => json!([0, value]),
            Err(error) => json!([1, error]),
        };
        // Legacy engines hand numbers over as doubles.
        if let Variant::Object(host) = self.prop(BRIDGE_PROPERTY) {
            host.call(
                "resolve",
                &[Variant::Float(id as f64), Variant::from(encoded.to_string())],
            )
            .expect("host resolve never fails");
        }
    }

    fn exec_script(&self, source: &str) {
        self.scripts.lock().push(source.to_string());
        if source.contains("document.__crebass__promise = null") {
            self.props
                .lock()
                .insert(BRIDGE_PROPERTY.to_string(), Variant::Null);
            self.entry_point.store(false, Ordering::SeqCst);
            return;
        }
        if !source.contains(INSTALL_MARKER) {
            return;
        }

        let Variant::Object(host) = self.prop(BRIDGE_PROPERTY) else {
            return;
        };
        self.entry_point.store(true, Ordering::SeqCst);
        if self.is_installed() {
            return;
        }
        {
            let mut props = self.props.lock();
            props.insert(INSTALL_MARKER.to_string(), Variant::from(AGENT_VERSION));
            props.insert(CONSOLE_MARKER.to_string(), Variant::Bool(true));
            props.insert(ERROR_MARKER.to_string(), Variant::Bool(true));
        }
        host.call(
            "log",
            &[Variant::from("INSTALL"), Variant::from("page agent installed")],
        )
        .expect("host log never fails");
    }
}

impl Dispatch for FakeDocument {
    fn members(&self) -> Vec<MemberInfo> {
        vec![MemberInfo::getter("defaultView"), MemberInfo::getter("URL")]
    }

    fn get(&self, name: &str) -> Result<Variant> {
        match name {
            "defaultView" => Ok(Variant::Object(self.window.clone())),
            "URL" => Ok(Variant::from(self.url.as_str())),
            _ => Ok(self.prop(name)),
        }
    }

    fn put(&self, name: &str, value: Variant) -> Result<()> {
        self.props.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn call(&self, name: &str, args: &[Variant]) -> Result<Variant> {
        if name != ENTRY_POINT || !self.entry_point.load(Ordering::SeqCst) {
            return Err(CrebassError::dispatch(name, "object doesn't support this action"));
        }
        let id = args
            .first()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| CrebassError::dispatch(name, "missing id"))? as u64;
        let code = args
            .get(1)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if self.deferred.load(Ordering::SeqCst) {
            self.queued.lock().push((id, code));
        } else {
            self.report(id, &code);
        }
        Ok(Variant::Empty)
    }
}

pub struct FakeWindow {
    document: Weak<FakeDocument>,
}

impl Dispatch for FakeWindow {
    fn members(&self) -> Vec<MemberInfo> {
        vec![MemberInfo::method("execScript")]
    }

    fn get(&self, name: &str) -> Result<Variant> {
        Err(CrebassError::dispatch(name, "unknown name"))
    }

    fn put(&self, name: &str, _value: Variant) -> Result<()> {
        Err(CrebassError::dispatch(name, "unknown name"))
    }

    fn call(&self, name: &str, args: &[Variant]) -> Result<Variant> {
        if name != "execScript" {
            return Err(CrebassError::dispatch(name, "unknown name"));
        }
        let document = self
            .document
            .upgrade()
            .ok_or_else(|| CrebassError::dispatch(name, "document unloaded"))?;
        let source = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        document.exec_script(source);
        Ok(Variant::Empty)
    }
}

const BROWSER_PROPERTIES: [&str; 16] = [
    "Visible",
    "MenuBar",
    "ToolBar",
    "AddressBar",
    "StatusBar",
    "FullScreen",
    "TheaterMode",
    "Resizable",
    "Silent",
    "Offline",
    "RegisterAsBrowser",
    "RegisterAsDropTarget",
    "Width",
    "Height",
    "Left",
    "Top",
];

const BROWSER_METHODS: [&str; 10] = [
    "Navigate",
    "Navigate2",
    "GoBack",
    "GoForward",
    "GoHome",
    "GoSearch",
    "Refresh",
    "Refresh2",
    "Stop",
    "Quit",
];

pub struct FakeBrowser {
    self_ref: Weak<FakeBrowser>,
    props: Mutex<HashMap<String, Variant>>,
    document: Mutex<Option<Arc<FakeDocument>>>,
    calls: Mutex<Vec<(String, Vec<Variant>)>>,
    sink: Mutex<Option<mpsc::UnboundedSender<NavigationEvent>>>,
    evaluator: Arc<Evaluator>,
}

impl FakeBrowser {
    pub fn new(evaluator: Arc<Evaluator>) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let mut props = HashMap::new();
            props.insert("Visible".to_string(), Variant::Bool(false));
            props.insert("MenuBar".to_string(), Variant::Bool(true));
            props.insert("ToolBar".to_string(), Variant::Int(1));
            props.insert("Width".to_string(), Variant::Int(800));
            props.insert("Busy".to_string(), Variant::Bool(false));
            props.insert(
                "LocationURL".to_string(),
                Variant::from("about:blank"),
            );
            Self {
                self_ref: weak.clone(),
                props: Mutex::new(props),
                document: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
                sink: Mutex::new(None),
                evaluator,
            }
        })
    }

    pub fn as_dispatch(&self) -> Arc<dyn Dispatch> {
        self.self_ref.upgrade().expect("browser alive")
    }

    pub fn frame(&self) -> Frame {
        Frame::top(self.as_dispatch())
    }

    /// This browser object as a frame nested in another document.
    pub fn child_frame(&self, name: &str) -> Frame {
        Frame::child(name, self.as_dispatch())
    }

    pub fn prop(&self, name: &str) -> Variant {
        self.props.lock().get(name).cloned().unwrap_or(Variant::Empty)
    }

    pub fn calls(&self) -> Vec<(String, Vec<Variant>)> {
        self.calls.lock().clone()
    }

    pub fn called(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub fn document(&self) -> Option<Arc<FakeDocument>> {
        self.document.lock().clone()
    }

    /// Replace the current document, as a completed navigation does.
    pub fn load(&self, url: &str) -> Arc<FakeDocument> {
        let document = FakeDocument::new(url, Arc::clone(&self.evaluator));
        *self.document.lock() = Some(Arc::clone(&document));
        self.props
            .lock()
            .insert("LocationURL".to_string(), Variant::from(url));
        document
    }

    fn emit(&self, event: NavigationEvent) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.send(event);
        }
    }

    fn navigated(&self, url: &str) {
        self.emit(NavigationEvent::BeforeNavigate {
            frame: self.frame(),
            url: url.to_string(),
            flags: 0,
            target_frame_name: String::new(),
            post_data: None,
            headers: None,
        });
        self.load(url);
        self.emit(NavigationEvent::NavigateComplete {
            frame: self.frame(),
            url: url.to_string(),
        });
        self.emit(NavigationEvent::DocumentComplete {
            frame: self.frame(),
            url: url.to_string(),
        });
    }
}

impl Dispatch for FakeBrowser {
    fn members(&self) -> Vec<MemberInfo> {
        let mut members: Vec<MemberInfo> = BROWSER_PROPERTIES
            .iter()
            .flat_map(|p| [MemberInfo::getter(*p), MemberInfo::setter(*p)])
            .collect();
        for p in ["Busy", "LocationURL", "Document"] {
            members.push(MemberInfo::getter(p));
        }
        members.extend(BROWSER_METHODS.iter().map(|m| MemberInfo::method(*m)));
        members
    }

    fn get(&self, name: &str) -> Result<Variant> {
        if name == "Document" {
            return Ok(match self.document() {
                Some(document) => Variant::Object(document),
                None => Variant::Null,
            });
        }
        self.props
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| CrebassError::dispatch(name, "unknown name"))
    }

    fn put(&self, name: &str, value: Variant) -> Result<()> {
        if !BROWSER_PROPERTIES.contains(&name) {
            return Err(CrebassError::dispatch(name, "property is read-only"));
        }
        self.props.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn call(&self, name: &str, args: &[Variant]) -> Result<Variant> {
        if !BROWSER_METHODS.contains(&name) {
            return Err(CrebassError::dispatch(name, "unknown name"));
        }
        self.calls.lock().push((name.to_string(), args.to_vec()));
        if name == "Navigate" || name == "Navigate2" {
            if let Some(url) = args.first().and_then(|v| v.as_str()) {
                self.navigated(url);
            }
        }
        Ok(Variant::Empty)
    }
}

pub struct FakeServer {
    pub browser: Arc<FakeBrowser>,
    created: Mutex<Vec<(String, LaunchOptions)>>,
    released: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Self::with_evaluator(Arc::new(canned_evaluator))
    }

    pub fn with_evaluator(evaluator: Arc<Evaluator>) -> Arc<Self> {
        Arc::new(Self {
            browser: FakeBrowser::new(evaluator),
            created: Mutex::new(Vec::new()),
            released: AtomicUsize::new(0),
        })
    }

    pub fn created(&self) -> Vec<(String, LaunchOptions)> {
        self.created.lock().clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl AutomationServer for FakeServer {
    fn create(&self, prog_id: &str, options: &LaunchOptions) -> Result<Arc<dyn Dispatch>> {
        self.created.lock().push((prog_id.to_string(), *options));
        Ok(self.browser.as_dispatch())
    }

    fn advise(
        &self,
        _object: &Arc<dyn Dispatch>,
        sink: mpsc::UnboundedSender<NavigationEvent>,
    ) -> Result<()> {
        *self.browser.sink.lock() = Some(sink);
        Ok(())
    }

    fn release(&self, _object: &Arc<dyn Dispatch>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wait until `frame` reaches `state`, failing the test after two seconds.
pub async fn wait_for_state(bridge: &CallBridge, frame: &str, state: BridgeState) {
    let mut rx = bridge.subscribe(frame);
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.state == state))
        .await
        .expect("timed out waiting for bridge state")
        .expect("status channel closed");
}

/// Bridge components wired together around a `FakeBrowser`, with navigation
/// driven by hand instead of through the event channel.
pub struct Harness {
    pub server: Arc<FakeServer>,
    pub calls: Arc<crebass_lib::bridge::PendingCalls>,
    pub bridge: Arc<CallBridge>,
    pub host: Arc<crebass_lib::bridge::HostBridge>,
    pub controller: Arc<crebass_lib::lifecycle::LifecycleController>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_bootstrap(Vec::new())
    }

    pub fn with_bootstrap(bootstrap: Vec<std::path::PathBuf>) -> Self {
        Self::with_settings(fast_settings(), bootstrap)
    }

    pub fn with_settings(
        settings: crebass_lib::config::BridgeSettings,
        bootstrap: Vec<std::path::PathBuf>,
    ) -> Self {
        let server = FakeServer::new();
        let calls = Arc::new(crebass_lib::bridge::PendingCalls::new());
        let bridge = Arc::new(CallBridge::new(Arc::clone(&calls)));
        let host = Arc::new(crebass_lib::bridge::HostBridge::new(Arc::clone(&calls)));
        let controller = Arc::new(crebass_lib::lifecycle::LifecycleController::new(
            Arc::clone(&bridge),
            Arc::clone(&host),
            &settings,
            bootstrap,
        ));
        Self {
            server,
            calls,
            bridge,
            host,
            controller,
        }
    }

    /// Load a new top-level document and deliver its `NavigateComplete`.
    pub fn navigate(&self, url: &str) -> (Arc<FakeDocument>, tokio::task::JoinHandle<()>) {
        let document = self.server.browser.load(url);
        let task = self
            .controller
            .handle(NavigationEvent::NavigateComplete {
                frame: self.server.browser.frame(),
                url: url.to_string(),
            })
            .expect("NavigateComplete starts an installation");
        (document, task)
    }

    /// Load a document into `browser` as a sub-frame of the current page.
    pub fn navigate_child(
        &self,
        browser: &FakeBrowser,
        name: &str,
        url: &str,
    ) -> (Arc<FakeDocument>, tokio::task::JoinHandle<()>) {
        let document = browser.load(url);
        let task = self
            .controller
            .handle(NavigationEvent::NavigateComplete {
                frame: browser.child_frame(name),
                url: url.to_string(),
            })
            .expect("NavigateComplete starts an installation");
        (document, task)
    }

    /// Navigate and wait for the installation task to finish.
    pub async fn load(&self, url: &str) -> Arc<FakeDocument> {
        let (document, task) = self.navigate(url);
        task.await.expect("installation task panicked");
        document
    }
}

/// Bridge settings with short delays for tests.
pub fn fast_settings() -> crebass_lib::config::BridgeSettings {
    crebass_lib::config::BridgeSettings {
        settling_delay_ms: 5,
        console_rearm_ms: 1000,
        startup_delay_ms: 0,
        bootstrap_timeout_ms: None,
    }
}

/// Yield until `document` holds `count` deferred calls.
pub async fn until_queued(document: &FakeDocument, count: usize) {
    for _ in 0..1000 {
        if document.queued_ids().len() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {} queued calls", count);
}
