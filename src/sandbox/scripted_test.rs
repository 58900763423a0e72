//! Scripted isolation backend for tests: simulates component execution and
//! counts every realm, execution and revocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::SandboxMountError;
use super::backend::{IsolationBackend, Realm, RenderOutcome};
use super::document::ExecutionDocument;

#[derive(Default)]
struct Counters {
    executions: AtomicU64,
    allocated: AtomicU64,
    revoked: AtomicU64,
}

type OpenHook = Box<dyn Fn() + Send + Sync>;

pub struct ScriptedBackend {
    available: bool,
    counters: Arc<Counters>,
    on_open: Mutex<Option<OpenHook>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self { available: true, counters: Arc::default(), on_open: Mutex::new(None) }
    }

    /// Backend whose probe always fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { available: false, counters: Arc::default(), on_open: Mutex::new(None) }
    }

    pub fn executions(&self) -> u64 {
        self.counters.executions.load(Ordering::SeqCst)
    }

    pub fn allocated(&self) -> u64 {
        self.counters.allocated.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> u64 {
        self.counters.revoked.load(Ordering::SeqCst)
    }

    /// Run `hook` inside every later `open`, while the host is mid-mount.
    pub fn on_open(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_open.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }
}

impl IsolationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn probe(&self) -> Result<(), String> {
        if self.available { Ok(()) } else { Err("no isolation mechanism in this environment".into()) }
    }

    fn open(&self, document: ExecutionDocument) -> Result<Box<dyn Realm>, SandboxMountError> {
        if let Some(hook) = self.on_open.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            hook();
        }
        let n = self.counters.allocated.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedRealm {
            url: format!("scripted://realm/{n}"),
            document,
            counters: Arc::clone(&self.counters),
            open: true,
        }))
    }
}

struct ScriptedRealm {
    url: String,
    document: ExecutionDocument,
    counters: Arc<Counters>,
    open: bool,
}

impl Realm for ScriptedRealm {
    fn url(&self) -> Option<&str> {
        self.open.then_some(self.url.as_str())
    }

    /// Throws when the source contains `throw new Error("…")`, or when the
    /// entry symbol is not declared in the source.
    fn render(&mut self) -> RenderOutcome {
        self.counters.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = thrown_message(&self.document.source_text) {
            return RenderOutcome::Threw(message);
        }
        let entry = &self.document.entry;
        if !entry.candidates.contains(&entry.symbol) {
            return RenderOutcome::Threw(format!("{} is not a function component", entry.symbol));
        }
        RenderOutcome::Rendered
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.counters.revoked.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedRealm {
    fn drop(&mut self) {
        self.close();
    }
}

fn thrown_message(source: &str) -> Option<String> {
    let start = source.find("throw new Error(")? + "throw new Error(".len();
    let rest = &source[start..];
    let quote = rest.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_owned())
}
