// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload filename sanitizing and naming rules.

use std::collections::BTreeSet;

const WINDOWS_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a client-supplied filename to a flat, ASCII-only name that is
/// safe to join onto a storage directory.
///
/// The result never contains a path separator and never starts or ends
/// with `.` or `_`. It may be empty.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or("");
    if !trimmed.is_empty()
        && WINDOWS_DEVICE_NAMES
            .iter()
            .any(|d| d.eq_ignore_ascii_case(stem))
    {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

/// Whether `name` carries one of the allowed extensions (case-insensitive).
pub fn allowed_file(name: &str, allowed: &BTreeSet<String>) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => allowed.contains(&ext.to_ascii_lowercase()),
        None => false,
    }
}

/// Secure `raw` for storage. When sanitizing strips the stem down to the
/// bare extension (`日本.mp4` secures to `mp4`), the raw name's allowed
/// extension is appended again.
pub fn secure_upload_name(raw: &str, allowed: &BTreeSet<String>) -> String {
    let secured = secure_filename(raw);
    if secured.is_empty() || allowed_file(&secured, allowed) {
        return secured;
    }

    let ext = raw
        .rsplit_once('.')
        .and_then(|(_, ext)| allowed.get(&ext.to_ascii_lowercase()));
    match ext {
        Some(ext) => format!("{secured}.{ext}"),
        None => secured,
    }
}

/// Split at the last dot, keeping the dot with the extension.
/// A dot in the first position does not start an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Storage name for an upload: eight random hex characters, then the
/// secured original name.
pub fn unique_upload_name(secured: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let (stem, ext) = split_extension(secured);
    format!("{}_{}{}", &id[..8], stem, ext)
}

/// Name of the processed counterpart of an upload.
pub fn output_name(unique: &str) -> String {
    format!("processed_{unique}")
}
