//! Windows implementations: logical-drive enumeration via `GetLogicalDrives`,
//! SUBST mappings via `QueryDosDeviceW`, network mappings via
//! `WNetGetConnectionW`, pid probing via `OpenProcess`.

use std::collections::HashMap;

use winapi::shared::minwindef::DWORD;
use winapi::um::fileapi::{GetLogicalDrives, QueryDosDeviceW};
use winapi::um::handleapi::CloseHandle;
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::winnetwk::WNetGetConnectionW;
use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

use crate::pathutil;

pub fn list_volumes() -> Vec<String> {
    let mask = unsafe { GetLogicalDrives() };
    let mut volumes = Vec::new();
    for i in 0..26u32 {
        if mask & (1 << i) != 0 {
            let letter = (b'A' + i as u8) as char;
            volumes.push(format!("{}:/", letter));
        }
    }
    volumes
}

pub fn drive_mappings() -> HashMap<String, String> {
    let mut mappings = HashMap::new();
    for volume in list_volumes() {
        let letter = &volume[..2]; // "C:"
        if let Some(target) = query_dos_device(letter) {
            // SUBST targets appear as "\??\C:\real\path".
            if let Some(stripped) = target.strip_prefix("\\??\\") {
                mappings.insert(volume.clone(), pathutil::normalize(stripped));
                continue;
            }
        }
        if let Some(remote) = query_network_target(letter) {
            mappings.insert(volume.clone(), pathutil::normalize(&remote));
        }
    }
    mappings
}

fn query_dos_device(device: &str) -> Option<String> {
    let wide: Vec<u16> = device.encode_utf16().chain(std::iter::once(0)).collect();
    let mut buffer = vec![0u16; 1024];
    let len = unsafe {
        QueryDosDeviceW(wide.as_ptr(), buffer.as_mut_ptr(), buffer.len() as DWORD)
    };
    if len == 0 {
        return None;
    }
    let first = buffer
        .split(|&c| c == 0)
        .next()
        .map(|s| String::from_utf16_lossy(s))?;
    if first.is_empty() {
        None
    } else {
        Some(first)
    }
}

fn query_network_target(device: &str) -> Option<String> {
    let wide: Vec<u16> = device.encode_utf16().chain(std::iter::once(0)).collect();
    let mut buffer = vec![0u16; 1024];
    let mut len: DWORD = buffer.len() as DWORD;
    let rc = unsafe { WNetGetConnectionW(wide.as_ptr(), buffer.as_mut_ptr(), &mut len) };
    if rc != 0 {
        return None;
    }
    let remote = buffer
        .split(|&c| c == 0)
        .next()
        .map(|s| String::from_utf16_lossy(s))?;
    if remote.is_empty() {
        None
    } else {
        Some(remote)
    }
}

pub fn pid_alive(pid: i64) -> bool {
    if pid <= 0 {
        return false;
    }
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid as DWORD) };
    if handle.is_null() {
        return false;
    }
    unsafe { CloseHandle(handle) };
    true
}
