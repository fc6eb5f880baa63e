//! Synthetic mouse clicks.
//!
//! Clicks are sent with SendInput so they pass through the same input path as
//! hardware events. This moves the actual cursor.

use anyhow::Result;

use crate::capture::Frame;
use crate::detection::Region;

/// Sends one left click at a screen position.
pub trait Clicker {
    fn click(&mut self, x: i32, y: i32) -> Result<()>;
}

/// Clicks through the operating system's input queue.
#[derive(Debug, Default)]
pub struct SystemClicker;

impl SystemClicker {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(windows)]
impl Clicker for SystemClicker {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        use anyhow::anyhow;
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
            MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_VIRTUALDESK, MOUSEINPUT,
            MOUSE_EVENT_FLAGS,
        };
        use windows::Win32::UI::WindowsAndMessaging::{
            GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
            SM_YVIRTUALSCREEN,
        };

        // The primary monitor need not start at the virtual desktop origin
        let (desk_x, desk_y, desk_w, desk_h) = unsafe {
            (
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };
        let norm_x = normalize_absolute(x, desk_x, desk_w);
        let norm_y = normalize_absolute(y, desk_y, desk_h);

        tracing::debug!(
            "Virtual desktop: {}x{} at ({}, {}), normalized coords: ({}, {})",
            desk_w,
            desk_h,
            desk_x,
            desk_y,
            norm_x,
            norm_y
        );

        let event = |flags: MOUSE_EVENT_FLAGS| INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: norm_x,
                    dy: norm_y,
                    dwFlags: flags
                        | MOUSEEVENTF_MOVE
                        | MOUSEEVENTF_ABSOLUTE
                        | MOUSEEVENTF_VIRTUALDESK,
                    ..Default::default()
                },
            },
        };
        let inputs = [
            event(MOUSE_EVENT_FLAGS(0)),
            event(MOUSEEVENTF_LEFTDOWN),
            event(MOUSEEVENTF_LEFTUP),
        ];

        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(anyhow!(
                "SendInput delivered {} of {} events",
                sent,
                inputs.len()
            ));
        }
        Ok(())
    }
}

#[cfg(not(windows))]
impl Clicker for SystemClicker {
    fn click(&mut self, _x: i32, _y: i32) -> Result<()> {
        Err(crate::capture::CaptureError::Unsupported.into())
    }
}

/// Maps a screen coordinate onto the 0..=65535 range used by absolute mouse input.
///
/// `origin` and `extent` describe the virtual desktop along one axis.
/// Coordinates outside the desktop are clamped to its edge.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn normalize_absolute(value: i32, origin: i32, extent: i32) -> i32 {
    if extent <= 1 {
        return 0;
    }
    let offset = i64::from(value - origin).clamp(0, i64::from(extent - 1));
    ((offset * 65535) / i64::from(extent - 1)) as i32
}

/// Clicks once at the center of `region`.
///
/// The region is in frame coordinates and is translated by the frame's screen
/// origin before clicking.
pub fn dispatch(clicker: &mut dyn Clicker, frame: &Frame, region: &Region) -> Result<()> {
    let (x, y) = frame.to_screen(region.center());
    tracing::info!("Clicking at screen ({}, {})", x, y);
    clicker.click(x, y)
}
