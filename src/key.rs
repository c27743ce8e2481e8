use crate::error::LedgerError;

/// Separator placed between the parts of a composite key. It may never occur inside a part.
pub const KEY_DELIMITER: char = ':';

// The byte immediately after the delimiter; used as the exclusive upper bound of prefix ranges.
const KEY_DELIMITER_SUCCESSOR: char = ';';

/// Join key parts with the delimiter (e.g. `["aspirin", "00001"]` -> `aspirin:00001`)
pub fn make_key<S: AsRef<str>>(parts: &[S]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(KEY_DELIMITER);
        }
        key.push_str(part.as_ref());
    }
    key
}

/// Split a key back into its parts.
///
/// This is the inverse of [`make_key`] for any non-empty list of parts that do not
/// contain the delimiter themselves; use [`validate_part`] on caller input first.
pub fn split_key(key: &str) -> Vec<String> {
    key.split(KEY_DELIMITER).map(str::to_string).collect()
}

/// Build the full ledger key of an entity: its namespace followed by its own key parts
pub fn namespaced_key<S: AsRef<str>>(namespace: &str, parts: &[S]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(part.as_ref());
    }
    key
}

/// Half-open key range `[start, end)` covering every key that extends
/// `namespace:parts..` by at least one more component.
pub fn prefix_range<S: AsRef<str>>(namespace: &str, parts: &[S]) -> (String, String) {
    let base = namespaced_key(namespace, parts);
    let mut start = base.clone();
    start.push(KEY_DELIMITER);
    let mut end = base;
    end.push(KEY_DELIMITER_SUCCESSOR);
    (start, end)
}

/// Reject parts that would break the codec
pub fn validate_part(part: &str) -> Result<(), LedgerError> {
    if part.is_empty() {
        return Err(LedgerError::Validation("key part must not be empty".to_string()));
    }
    if part.contains(KEY_DELIMITER) {
        return Err(LedgerError::Validation(format!(
            "key part {:?} contains the reserved delimiter '{}'",
            part, KEY_DELIMITER
        )));
    }
    Ok(())
}

/// Canonical form of a caller-supplied identifier: trimmed, lowercased and safe to use as a key part.
///
/// `what` names the identifier in the error message.
pub fn normalize_identifier(what: &str, raw: &str) -> Result<String, LedgerError> {
    let normalized = raw.trim().to_lowercase();
    validate_part(&normalized).map_err(|e| match e {
        LedgerError::Validation(msg) => LedgerError::Validation(format!("{}: {}", what, msg)),
        other => other,
    })?;
    Ok(normalized)
}
