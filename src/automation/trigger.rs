//! Scan trigger.
//!
//! A listener thread turns key presses into signals on a channel of capacity
//! one. The main thread blocks on the receiver; presses arriving while a
//! signal is still pending are dropped.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

/// Maps a letter or digit to its virtual-key code.
pub fn trigger_virtual_key(key: char) -> Result<u32> {
    match key {
        'a'..='z' | 'A'..='Z' | '0'..='9' => Ok(key.to_ascii_uppercase() as u32),
        _ => Err(anyhow!(
            "Unsupported trigger key {:?}: expected a letter or digit",
            key
        )),
    }
}

/// Signals the scanner. Returns false if a signal is already pending or the
/// receiver is gone.
pub fn notify(tx: &SyncSender<()>) -> bool {
    match tx.try_send(()) {
        Ok(()) => true,
        Err(TrySendError::Full(())) => {
            tracing::debug!("Trigger already pending, ignoring key press");
            false
        }
        Err(TrySendError::Disconnected(())) => false,
    }
}

/// Starts listening for the global hotkey `key` (no modifiers).
///
/// Returns once the hotkey is registered, or with the registration error.
#[cfg(windows)]
pub fn spawn_listener(key: char) -> Result<Receiver<()>> {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_NOREPEAT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    const HOTKEY_ID: i32 = 1;

    let vk = trigger_virtual_key(key)?;
    let (tx, rx) = sync_channel::<()>(1);
    let (ready_tx, ready_rx) = sync_channel::<Result<(), String>>(1);

    std::thread::Builder::new()
        .name("hotkey".to_string())
        .spawn(move || {
            // The hotkey belongs to this thread's message queue
            if let Err(e) = unsafe { RegisterHotKey(HWND::default(), HOTKEY_ID, MOD_NOREPEAT, vk) } {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                    if msg.message == WM_HOTKEY && msg.wParam.0 as i32 == HOTKEY_ID {
                        tracing::info!("Trigger key pressed");
                        notify(&tx);
                    }
                }
                let _ = UnregisterHotKey(HWND::default(), HOTKEY_ID);
            }
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(rx),
        Ok(Err(e)) => Err(anyhow!("Failed to register hotkey {:?}: {}", key, e)),
        Err(_) => Err(anyhow!("Hotkey thread exited during startup")),
    }
}

/// Starts listening for Enter on stdin; global hotkeys are Windows-only.
#[cfg(not(windows))]
pub fn spawn_listener(key: char) -> Result<Receiver<()>> {
    use std::io::BufRead;

    trigger_virtual_key(key)?;
    let (tx, rx) = sync_channel::<()>(1);

    std::thread::Builder::new()
        .name("trigger".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if line.is_err() {
                    break;
                }
                tracing::info!("Trigger received");
                notify(&tx);
            }
        })?;

    Ok(rx)
}
