// src/events.rs
//! Progress notifications, kept separate from the build result.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Begin { cmd: String },
    BeforeRead { file: PathBuf },
    AfterRead { file: PathBuf, bytes: usize },
    BeforeMerge { count: usize },
    AfterMerge,
    BeforeTheme { theme: String },
    AfterTheme { theme: String, root: PathBuf },
    VerifyOutputs { targets: Vec<PathBuf> },
    ApplyTheme { theme: String },
    BeforeGenerate { format: String, file: PathBuf },
    AfterGenerate { format: String, file: PathBuf, error: Option<String> },
    AfterTransform { format: String, template: PathBuf },
    BeforeWrite { file: PathBuf },
    AfterWrite { file: PathBuf },
    Error { code: &'static str, message: String },
    End { cmd: String },
}

/// Receives build notifications.
pub trait BuildObserver: Send + Sync {
    fn notify(&self, event: &BuildEvent);
}

impl<F> BuildObserver for F
where
    F: Fn(&BuildEvent) + Send + Sync,
{
    fn notify(&self, event: &BuildEvent) {
        self(event)
    }
}

/// Fans one event out to every registered observer.
#[derive(Clone, Default)]
pub struct Notifier {
    observers: Vec<Arc<dyn BuildObserver>>,
}

impl Notifier {
    pub fn new(observers: Vec<Arc<dyn BuildObserver>>) -> Self {
        Self { observers }
    }

    pub fn stat(&self, event: BuildEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
    }

    pub fn observers(&self) -> &[Arc<dyn BuildObserver>] {
        &self.observers
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.len())
            .finish()
    }
}
