// INI lookups - reads single values out of a server's own INI file

use std::path::Path;

/// Find the value of `key` in INI content.
/// Sections are ignored; the first non-empty match wins.
pub fn read_ini_value(content: &str, key: &str) -> Option<String> {
    for line in content.lines() {
        let trimmed = line.trim();

        // Skip comments, section headers and empty lines
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with(';')
            || (trimmed.starts_with('[') && trimmed.ends_with(']'))
        {
            continue;
        }

        if let Some(eq_pos) = trimmed.find('=') {
            if trimmed[..eq_pos].trim() == key {
                let value = trimmed[eq_pos + 1..].trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

/// Read a key from an INI file; an unreadable file counts as absent.
pub fn read_ini_file_value(path: &Path, key: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => read_ini_value(&content, key),
        Err(e) => {
            tracing::debug!("Could not read INI {:?}: {}", path, e);
            None
        }
    }
}

pub fn read_rcon_password_from_ini(path: &Path) -> Option<String> {
    read_ini_file_value(path, "RCONPassword")
}

pub fn read_rcon_port_from_ini(path: &Path) -> Option<u16> {
    read_ini_file_value(path, "RCONPort").and_then(|v| v.parse().ok())
}
