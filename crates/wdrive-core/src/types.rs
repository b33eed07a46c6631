//! Small value types reported by the server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device orientation as understood by `/orientation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[serde(rename = "LANDSCAPE")]
    Landscape,
    #[serde(rename = "PORTRAIT")]
    Portrait,
    #[serde(rename = "UIA_DEVICE_ORIENTATION_LANDSCAPERIGHT")]
    LandscapeRight,
    #[serde(rename = "UIA_DEVICE_ORIENTATION_PORTRAIT_UPSIDEDOWN")]
    PortraitUpsideDown,
}

impl Orientation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "LANDSCAPE",
            Orientation::Portrait => "PORTRAIT",
            Orientation::LandscapeRight => "UIA_DEVICE_ORIENTATION_LANDSCAPERIGHT",
            Orientation::PortraitUpsideDown => "UIA_DEVICE_ORIENTATION_PORTRAIT_UPSIDEDOWN",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application state codes returned by `/wda/apps/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Code 1: the app is not running (or not installed).
    NotRunning,
    /// Code 2: the app is running in the background.
    Background,
    /// Code 4: the app is running in the foreground.
    Foreground,
    /// Any other code.
    Unknown(i64),
}

impl AppState {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => AppState::NotRunning,
            2 => AppState::Background,
            4 => AppState::Foreground,
            other => AppState::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            AppState::NotRunning => 1,
            AppState::Background => 2,
            AppState::Foreground => 4,
            AppState::Unknown(code) => code,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AppState::NotRunning => "App exists but does not survive or App does not exist",
            AppState::Background => "App exists but is in the background",
            AppState::Foreground => "App exists and is in the foreground",
            AppState::Unknown(_) => "Unknown app state",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Screen lock state from `/wda/locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

impl From<bool> for LockState {
    fn from(locked: bool) -> Self {
        if locked {
            LockState::Locked
        } else {
            LockState::Unlocked
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Locked => f.write_str("Device is locked"),
            LockState::Unlocked => f.write_str("Device is unlocked"),
        }
    }
}

/// Entry of `/wda/apps/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    #[serde(rename = "bundleId")]
    pub bundle_id: String,
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}
