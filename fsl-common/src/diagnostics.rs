//! Diagnostic reporting
//!
//! All user-visible linker output goes through a `Reporter`. Lines carry a
//! fixed `LINKER: ` prefix followed by a severity marker:
//!
//! - `LINKER: ERROR: <message>` for fatal errors (printed by the driver)
//! - `LINKER: <message>` for informational messages
//! - `LINKER: WARNING ONCE: <message>` for deduplicated warnings
//!
//! The print-once keys live in an `OnceStore` owned by the reporter. The store
//! starts empty and only grows during a run; tests may reset it.

use crate::error::LinkerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Prefix carried by every diagnostic line
pub const LINE_PREFIX: &str = "LINKER: ";

/// Messages starting with this template embed per-call arguments, so they
/// are deduplicated on the template alone.
const CALLING_EXTERNAL: &str = "calling external";

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Message,
    WarningOnce,
}

/// A single emitted diagnostic line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Message,
            message: message.into(),
        }
    }

    pub fn warning_once(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::WarningOnce,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.severity {
            Severity::Error => "ERROR: ",
            Severity::Message => "",
            Severity::WarningOnce => "WARNING ONCE: ",
        };
        write!(f, "{LINE_PREFIX}{marker}{}", self.message)
    }
}

/// Set of (site identity, message template) pairs already reported
#[derive(Debug, Default, Clone)]
pub struct OnceStore {
    keys: HashSet<(String, String)>,
}

impl OnceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key. Returns true if the key was not seen before.
    pub fn insert(&mut self, site: &str, template: &str) -> bool {
        let template = if template.starts_with(CALLING_EXTERNAL) {
            CALLING_EXTERNAL
        } else {
            template
        };
        self.keys.insert((site.to_string(), template.to_string()))
    }

    pub fn contains(&self, site: &str, template: &str) -> bool {
        let template = if template.starts_with(CALLING_EXTERNAL) {
            CALLING_EXTERNAL
        } else {
            template
        };
        self.keys.contains(&(site.to_string(), template.to_string()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Forget every key. Only meant for isolating test cases.
    pub fn reset(&mut self) {
        self.keys.clear();
    }
}

/// Collects emitted diagnostics and optionally echoes them to stderr
pub struct Reporter {
    once: OnceStore,
    emitted: Vec<Diagnostic>,
    echo: bool,
}

impl Reporter {
    /// Reporter that prints every line to stderr as it is emitted
    pub fn new() -> Self {
        Self {
            once: OnceStore::new(),
            emitted: Vec::new(),
            echo: true,
        }
    }

    /// Reporter that only records lines (used by tests)
    pub fn captured() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    fn emit(&mut self, diagnostic: Diagnostic) -> Diagnostic {
        if self.echo {
            eprintln!("{diagnostic}");
        }
        self.emitted.push(diagnostic.clone());
        diagnostic
    }

    /// Emit an informational `LINKER: <message>` line
    pub fn message(&mut self, message: impl Into<String>) -> Diagnostic {
        self.emit(Diagnostic::message(message))
    }

    /// Emit `LINKER: WARNING ONCE: <message>` unless (site, template) was
    /// already reported. `template` is the unformatted message shape so
    /// that per-site argument text does not defeat deduplication.
    pub fn message_once(
        &mut self,
        site: &str,
        template: &str,
        message: impl Into<String>,
    ) -> Option<Diagnostic> {
        if !self.once.insert(site, template) {
            return None;
        }
        Some(self.emit(Diagnostic::warning_once(message)))
    }

    /// Emit the fatal line for an error. The caller decides how to stop.
    pub fn error(&mut self, err: &LinkerError) -> Diagnostic {
        self.emit(Diagnostic::error(err.to_string()))
    }

    /// All lines emitted so far, in order
    pub fn emitted(&self) -> &[Diagnostic] {
        &self.emitted
    }

    /// Rendered lines emitted so far, in order
    pub fn lines(&self) -> Vec<String> {
        self.emitted.iter().map(|d| d.to_string()).collect()
    }

    pub fn once_store(&self) -> &OnceStore {
        &self.once
    }

    pub fn once_store_mut(&mut self) -> &mut OnceStore {
        &mut self.once
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
