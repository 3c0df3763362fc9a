//! Authorization popup requests and launchers.
//!
//! The controller only decides *when* a popup opens and what it looks like.
//! Opening it is delegated to a [`PopupLauncher`]; a browser host would map
//! [`PopupRequest`] onto a named window, while [`SystemBrowserLauncher`]
//! hands the URL to the desktop's default browser.

use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{AuthFlowError, Result};

/// Window features other than geometry, fixed for every popup.
const WINDOW_FEATURES: &str =
    "resizable=yes,scrollbars=yes,toolbar=no,menubar=no,location=no,status=no";

/// Dimensions of the screen the popup is centered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Popup window settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Name of the reusable window; repeated launches target the same one.
    pub window_name: String,

    /// Popup width in pixels.
    ///
    /// Default: **600**.
    pub width: u32,

    /// Popup height in pixels.
    ///
    /// Default: **500**.
    pub height: u32,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            window_name: "AuthPopup".to_string(),
            width: 600,
            height: 500,
        }
    }
}

/// Everything a launcher needs to open the authorization window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRequest {
    pub url: String,
    pub window_name: String,
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
}

impl PopupRequest {
    /// A popup of the configured size, centered on `screen`.
    ///
    /// Offsets clamp at zero when the popup is larger than the screen.
    pub fn centered(url: impl Into<String>, popup: &PopupConfig, screen: ScreenSize) -> Self {
        Self {
            url: url.into(),
            window_name: popup.window_name.clone(),
            width: popup.width,
            height: popup.height,
            left: screen.width.saturating_sub(popup.width) / 2,
            top: screen.height.saturating_sub(popup.height) / 2,
        }
    }

    /// The `window.open` style feature string.
    pub fn features(&self) -> String {
        format!(
            "width={},height={},top={},left={},{WINDOW_FEATURES}",
            self.width, self.height, self.top, self.left
        )
    }
}

/// Opens the authorization window. Fire-and-forget: the launcher reports
/// whether the window could be opened, never what happened inside it.
pub trait PopupLauncher: Send + Sync {
    /// Open (or re-target) the window named in `request`.
    fn launch(&self, request: &PopupRequest) -> Result<()>;

    /// Size of the screen popups are centered on.
    fn screen_size(&self) -> ScreenSize {
        ScreenSize::default()
    }
}

/// Opens the URL in the operating system's default browser.
///
/// Geometry and window name are not expressible through the OS URL
/// handler and are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowserLauncher;

impl PopupLauncher for SystemBrowserLauncher {
    fn launch(&self, request: &PopupRequest) -> Result<()> {
        tracing::debug!(window = %request.window_name, "opening system browser");
        open_browser(&request.url).map_err(|e| AuthFlowError::PopupFailed {
            reason: e.to_string(),
        })
    }
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        Command::new("cmd").args(["/C", "start", ""]).arg(url).spawn()?;
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Command::new("xdg-open").arg(url).spawn()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
