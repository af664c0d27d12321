//! Ctrl+C handling for the acquisition loop
//!
//! The handler only clears the registered running flag (an atomic store, safe
//! from a signal context on Unix and from the console control thread on
//! Windows). The monitor sees the cleared flag at the top of its next
//! iteration and shuts down through its normal close path.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static RUNNING: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Route Ctrl+C to `running`. Only the first registered flag is used.
pub fn install(running: Arc<AtomicBool>) -> io::Result<()> {
    if RUNNING.set(running).is_err() {
        log::debug!("Interrupt handler already installed");
        return Ok(());
    }

    #[cfg(unix)]
    {
        let previous = unsafe { libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::TRUE;
        use windows::Win32::System::Console::SetConsoleCtrlHandler;

        unsafe { SetConsoleCtrlHandler(Some(handle_console_ctrl), TRUE) }
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }

    Ok(())
}

fn interrupt() {
    if let Some(running) = RUNNING.get() {
        running.store(false, Ordering::SeqCst);
    }
}

#[cfg(unix)]
extern "C" fn handle_sigint(_: libc::c_int) {
    interrupt();
}

#[cfg(windows)]
unsafe extern "system" fn handle_console_ctrl(ctrl_type: u32) -> windows::Win32::Foundation::BOOL {
    use windows::Win32::Foundation::{FALSE, TRUE};
    use windows::Win32::System::Console::{CTRL_BREAK_EVENT, CTRL_C_EVENT};

    if ctrl_type == CTRL_C_EVENT || ctrl_type == CTRL_BREAK_EVENT {
        interrupt();
        TRUE
    } else {
        FALSE
    }
}
