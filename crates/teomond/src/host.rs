//! Host identity for the collector's own record.

use std::ffi::CStr;

/// Host name via gethostname(2), falling back to procfs.
pub fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc == 0 {
        if let Ok(name) = CStr::from_bytes_until_nul(&buf) {
            let name = name.to_string_lossy().trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }
    read_text_file("/proc/sys/kernel/hostname").unwrap_or_default()
}

/// Contents of /etc/machine-id, or empty.
pub fn machine_id() -> String {
    read_text_file("/etc/machine-id")
        .or_else(|| read_text_file("/var/lib/dbus/machine-id"))
        .unwrap_or_default()
}

fn read_text_file(path: &str) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
