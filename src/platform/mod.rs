//! Thin OS shims: volume enumeration, drive-alias mappings, pid liveness,
//! hostname. Windows carries the real implementations; elsewhere the
//! single root volume stands in and the mapping table is empty.

#[cfg(target_os = "windows")]
pub mod windows;

use std::collections::HashMap;

/// All visible volumes, normalized ("C:/", "D:/", ..., or "/" on POSIX).
pub fn list_volumes() -> Vec<String> {
    #[cfg(target_os = "windows")]
    {
        windows::list_volumes()
    }
    #[cfg(not(target_os = "windows"))]
    {
        vec!["/".to_string()]
    }
}

/// OS-level drive aliases: alias drive name → real path. Sourced from the
/// DOS-device substitution table and mapped network drives on Windows.
pub fn drive_mappings() -> HashMap<String, String> {
    #[cfg(target_os = "windows")]
    {
        windows::drive_mappings()
    }
    #[cfg(not(target_os = "windows"))]
    {
        HashMap::new()
    }
}

/// Whether a process with the given pid exists on this host.
pub fn pid_alive(pid: i64) -> bool {
    #[cfg(target_os = "windows")]
    {
        windows::pid_alive(pid)
    }
    #[cfg(unix)]
    {
        if pid <= 0 {
            return false;
        }
        // Signal 0 probes existence without delivering anything. EPERM
        // still means the process exists.
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(any(target_os = "windows", unix)))]
    {
        let _ = pid;
        true
    }
}

pub fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string())
}

pub fn current_pid() -> i64 {
    std::process::id() as i64
}
