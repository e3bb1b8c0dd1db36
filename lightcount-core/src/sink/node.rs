/// Derive a sanitized node name from the host's hostname: only
/// `[A-Za-z0-9._-]` survive, everything else becomes `_`. Grounded on the
/// original's `util_get_safe_node_name` (`daemon/util.c`).
pub fn safe_node_name() -> String {
    sanitize(&hostname())
}

fn hostname() -> String {
    unsafe_hostname().unwrap_or_else(|| "unknown_host".to_string())
}

/// `libc` is only a workspace dependency on Linux (needed there for the
/// raw-socket capture driver too); on other Unix platforms fall back to
/// the `HOSTNAME` environment variable rather than pulling in `libc` just
/// for this lookup.
#[cfg(target_os = "linux")]
fn unsafe_hostname() -> Option<String> {
    let mut buf = vec![0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Some(String::from_utf8_lossy(&buf[..len]).into_owned())
}

#[cfg(not(target_os = "linux"))]
fn unsafe_hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok()
}

pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::sanitize;

    #[test]
    fn passes_through_safe_characters() {
        assert_eq!(sanitize("host-01.example.com"), "host-01.example.com");
    }

    #[test]
    fn replaces_funny_characters() {
        assert_eq!(sanitize("host name/01:db"), "host_name_01_db");
    }

    #[test]
    fn handles_empty_string() {
        assert_eq!(sanitize(""), "");
    }
}
