use uuid::Uuid;

/// Length of a hyphenated UUID string (`8-4-4-4-12`).
const HYPHENATED_LEN: usize = 36;

/// Generate a new entity id (UUID v7, time-ordered, hyphenated).
///
/// Tables, columns, rows and views all use this format, which is also the
/// only format the index provisioner accepts.
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Strict id check: only the canonical lowercase hyphenated form is accepted.
///
/// `Uuid::try_parse` also takes uppercase hex and the simple, braced and URN
/// forms; those are rejected here so an id that passes can be embedded in DDL
/// verbatim and names exactly one cell key.
pub fn is_uuid(value: &str) -> bool {
    value.len() == HYPHENATED_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || b == b'-')
        && Uuid::try_parse(value).is_ok()
}
