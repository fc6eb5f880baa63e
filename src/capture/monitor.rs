//! Primary monitor discovery.

use anyhow::Result;

/// Screen-space bounds of a display monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl MonitorRect {
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Returns the first enumerated monitor.
///
/// Fails with `CaptureError::NoMonitor` if the system reports no usable monitor.
#[cfg(windows)]
pub fn primary_monitor() -> Result<MonitorRect> {
    use windows::Win32::Foundation::{BOOL, LPARAM, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO,
    };

    unsafe extern "system" fn enum_callback(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _clip: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        unsafe {
            let monitors = &mut *(lparam.0 as *mut Vec<MonitorRect>);

            let mut info = MONITORINFO {
                cbSize: std::mem::size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };
            if GetMonitorInfoW(hmonitor, &mut info).as_bool() {
                let r = info.rcMonitor;
                monitors.push(MonitorRect {
                    x: r.left,
                    y: r.top,
                    width: r.right - r.left,
                    height: r.bottom - r.top,
                });
            }

            TRUE
        }
    }

    let mut monitors: Vec<MonitorRect> = Vec::new();
    unsafe {
        // The return value only reports whether the callback stopped early
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(enum_callback),
            LPARAM(&mut monitors as *mut _ as isize),
        );
    }

    tracing::debug!("Enumerated {} monitor(s): {:?}", monitors.len(), monitors);
    first_usable(&monitors)
}

#[cfg(not(windows))]
pub fn primary_monitor() -> Result<MonitorRect> {
    Err(super::CaptureError::Unsupported.into())
}

/// Picks the first monitor in enumeration order.
#[cfg_attr(not(windows), allow(dead_code))]
fn first_usable(monitors: &[MonitorRect]) -> Result<MonitorRect> {
    match monitors.first() {
        Some(monitor) if !monitor.is_empty() => {
            tracing::info!(
                "Primary monitor detected: {}x{} at ({}, {})",
                monitor.width,
                monitor.height,
                monitor.x,
                monitor.y
            );
            Ok(*monitor)
        }
        _ => Err(super::CaptureError::NoMonitor.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::is_fatal;

    #[test]
    fn test_first_usable_picks_first_monitor() {
        let monitors = [
            MonitorRect { x: 0, y: 0, width: 1920, height: 1080 },
            MonitorRect { x: 1920, y: 0, width: 2560, height: 1440 },
        ];
        assert_eq!(first_usable(&monitors).unwrap(), monitors[0]);
    }

    #[test]
    fn test_no_monitor_is_fatal() {
        let err = first_usable(&[]).unwrap_err();
        assert!(is_fatal(&err));

        let err = first_usable(&[MonitorRect { x: 0, y: 0, width: 0, height: 1080 }]).unwrap_err();
        assert!(is_fatal(&err));
    }
}
