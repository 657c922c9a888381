//! The key device seam.
//!
//! The OS-level key injection lives outside this crate; anything that can press and release
//! a named key implements [`KeyDevice`]. Implementations are shared between the scheduler and
//! the control listener, so they take `&self` and must be `Send + Sync`.

use crate::error::ReplayError;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

pub trait KeyDevice: Send + Sync {
    fn press(&self, key: &str) -> Result<(), ReplayError>;

    /// Must succeed for a key that is not down; several cleanup paths may release the same key.
    fn release(&self, key: &str) -> Result<(), ReplayError>;
}

/// Device that only logs. Used for dry runs.
#[derive(Debug, Default)]
pub struct LogDevice;

impl KeyDevice for LogDevice {
    fn press(&self, key: &str) -> Result<(), ReplayError> {
        log::info!("press {}", key);
        Ok(())
    }

    fn release(&self, key: &str) -> Result<(), ReplayError> {
        log::info!("release {}", key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    Press(String),
    Release(String),
}

#[derive(Debug, Default)]
struct Recorded {
    actions: Vec<DeviceAction>,
    down: BTreeSet<String>,
}

/// Device that records every action and tracks which keys are down.
///
/// Failures can be injected per key; the attempt is recorded before the error is returned.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    recorded: Mutex<Recorded>,
    fail_press: BTreeSet<String>,
    fail_release: BTreeSet<String>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_press<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_press.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn failing_release<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_release.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn actions(&self) -> Vec<DeviceAction> {
        self.lock().actions.clone()
    }

    /// Keys pressed and not yet released.
    pub fn keys_down(&self) -> BTreeSet<String> {
        self.lock().down.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn injected(key: &str) -> ReplayError {
    ReplayError::DeviceError {
        key: key.to_string(),
        message: "injected failure".to_string(),
    }
}

impl KeyDevice for RecordingDevice {
    fn press(&self, key: &str) -> Result<(), ReplayError> {
        let mut recorded = self.lock();
        recorded.actions.push(DeviceAction::Press(key.to_string()));
        if self.fail_press.contains(key) {
            return Err(injected(key));
        }
        recorded.down.insert(key.to_string());
        Ok(())
    }

    fn release(&self, key: &str) -> Result<(), ReplayError> {
        let mut recorded = self.lock();
        recorded.actions.push(DeviceAction::Release(key.to_string()));
        if self.fail_release.contains(key) {
            return Err(injected(key));
        }
        recorded.down.remove(key);
        Ok(())
    }
}
