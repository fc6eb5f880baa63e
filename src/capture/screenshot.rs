//! Screenshot capture of the primary monitor using GDI.

use anyhow::Result;
use image::{Rgb, RgbImage};

use super::monitor::{primary_monitor, MonitorRect};
use super::{Frame, FrameSource};

/// Captures the whole primary monitor on every call.
///
/// The monitor is enumerated again for each frame so resolution changes
/// between iterations are picked up.
#[derive(Debug, Default)]
pub struct ScreenSource;

impl ScreenSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for ScreenSource {
    fn capture(&mut self) -> Result<Frame> {
        let monitor = primary_monitor()?;
        let image = capture_rect(&monitor)?;
        Ok(Frame::new(image, (monitor.x, monitor.y)))
    }
}

/// Copies the screen pixels inside `rect` into an RGB image.
///
/// This function:
/// 1. Gets the screen device context
/// 2. Blits the monitor area into a compatible bitmap
/// 3. Reads the bitmap back as top-down 32-bit BGRA rows
/// 4. Converts BGRA to RGB
#[cfg(windows)]
pub fn capture_rect(rect: &MonitorRect) -> Result<RgbImage> {
    use anyhow::anyhow;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT,
        DIB_RGB_COLORS, SRCCOPY,
    };

    let (width, height) = (rect.width, rect.height);
    let mut buffer = vec![0u8; width as usize * height as usize * 4];

    let lines = unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(anyhow!("GetDC failed for the screen"));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let previous = SelectObject(mem_dc, bitmap);

        let blit = BitBlt(
            mem_dc,
            0,
            0,
            width,
            height,
            screen_dc,
            rect.x,
            rect.y,
            SRCCOPY | CAPTUREBLT,
        );
        // GetDIBits needs the bitmap deselected
        SelectObject(mem_dc, previous);

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // Negative height requests top-down rows
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let lines = if blit.is_ok() {
            GetDIBits(
                mem_dc,
                bitmap,
                0,
                height as u32,
                Some(buffer.as_mut_ptr() as *mut std::ffi::c_void),
                &mut info,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        ReleaseDC(HWND::default(), screen_dc);

        blit.map_err(|e| anyhow!("BitBlt failed: {}", e))?;
        lines
    };

    if lines != height {
        return Err(anyhow!(
            "GetDIBits copied {} of {} scan lines",
            lines,
            height
        ));
    }

    bgra_to_rgb(&buffer, width as u32, height as u32)
}

#[cfg(not(windows))]
pub fn capture_rect(_rect: &MonitorRect) -> Result<RgbImage> {
    Err(super::CaptureError::Unsupported.into())
}

/// Converts tightly packed BGRA rows into an RGB image, dropping alpha.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn bgra_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = width as usize * height as usize * 4;
    if data.len() < expected {
        anyhow::bail!(
            "BGRA buffer too small: {} bytes for {}x{}",
            data.len(),
            width,
            height
        );
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let offset = (y as usize * width as usize + x as usize) * 4;
        Rgb([data[offset + 2], data[offset + 1], data[offset]])
    }))
}
