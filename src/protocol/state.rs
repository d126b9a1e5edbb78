//! Process-wide configuration state of a registered family.

use std::sync::atomic::{AtomicU16, Ordering};

/// Debug verbosity cell
///
/// Written by the set-param handler, read by every gated log call site.
/// Relaxed ordering: a reader sees either the old or the new value, never a
/// torn one, and staleness only affects log verbosity.
#[derive(Debug, Default)]
pub struct DebugLevel(AtomicU16);

impl DebugLevel {
    pub fn new(level: u16) -> Self {
        Self(AtomicU16::new(level))
    }

    #[inline]
    pub fn get(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, level: u16) {
        self.0.store(level, Ordering::Relaxed);
    }

    /// True when a message at `verbosity` should be logged
    #[inline]
    pub fn enabled(&self, verbosity: u16) -> bool {
        verbosity <= self.get()
    }
}

/// All mutable and reported state of the control family
#[derive(Debug)]
pub struct ControlState {
    debug_level: DebugLevel,
    default_level: u16,
    module_version: String,
}

impl ControlState {
    pub fn new(debug_level: u16, module_version: impl Into<String>) -> Self {
        Self {
            debug_level: DebugLevel::new(debug_level),
            default_level: debug_level,
            module_version: module_version.into(),
        }
    }

    pub fn debug_level(&self) -> &DebugLevel {
        &self.debug_level
    }

    pub fn module_version(&self) -> &str {
        &self.module_version
    }

    /// Restore the start-up debug level
    pub fn reset(&self) {
        self.debug_level.set(self.default_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_gate() {
        let level = DebugLevel::new(2);
        assert!(level.enabled(0));
        assert!(level.enabled(2));
        assert!(!level.enabled(3));
    }

    #[test]
    fn test_reset_restores_start_level() {
        let state = ControlState::new(4, "0.0.0");
        state.debug_level().set(1);
        assert_eq!(state.debug_level().get(), 1);
        state.reset();
        assert_eq!(state.debug_level().get(), 4);
        assert_eq!(state.module_version(), "0.0.0");
    }

    #[test]
    fn test_any_u16_accepted() {
        let level = DebugLevel::new(0);
        level.set(u16::MAX);
        assert_eq!(level.get(), u16::MAX);
    }
}
