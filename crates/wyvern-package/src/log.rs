//! Package events
//!
//! Repositories and the resolver report what they do through a [`Logger`]
//! passed in by the caller.

use crate::archive::PackageId;
use crate::resolver::SkipReason;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A dependency was fetched and its configuration read
    Loaded { id: PackageId },
    /// A dependency could not be used and was left out
    Skipped { id: PackageId, reason: SkipReason },
    /// A package was stored in a repository
    Installed { location: PathBuf },
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Loaded { id } => write!(f, "Loaded {}", id),
            LogEvent::Skipped { id, reason } => {
                write!(f, "Skipping dependency {}: {}", id, reason)
            }
            LogEvent::Installed { location } => write!(f, "Installed {}", location.display()),
        }
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, event: &LogEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _event: &LogEvent) {}
}

/// Prints events to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn log(&self, event: &LogEvent) {
        eprintln!("{}", event);
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Rendered messages, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, event: &LogEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SemanticVersion;

    #[test]
    fn test_messages() {
        let logger = MemoryLogger::new();
        let id = PackageId::new("json", SemanticVersion::new(1, 0, 0));
        logger.log(&LogEvent::Loaded { id: id.clone() });
        logger.log(&LogEvent::Skipped {
            id,
            reason: SkipReason::NotFound,
        });
        logger.log(&LogEvent::Installed {
            location: PathBuf::from("/repo/json-v1.0.0.tar.gz"),
        });

        assert_eq!(
            logger.messages(),
            vec![
                "Loaded json-v1.0.0",
                "Skipping dependency json-v1.0.0: not found in repository",
                "Installed /repo/json-v1.0.0.tar.gz",
            ]
        );
    }
}
