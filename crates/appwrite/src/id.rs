use chrono::Utc;
use rand::Rng;

const DEFAULT_PADDING: usize = 7;
/// Longest id the service accepts.
pub const MAX_ID_LEN: usize = 36;

/// Generate a unique, roughly time-ordered id: hex seconds, hex millis
/// padded to five digits, then seven random hex digits.
pub fn unique() -> String {
    unique_with_padding(DEFAULT_PADDING)
}

pub fn unique_with_padding(padding: usize) -> String {
    let now = Utc::now();
    let mut id = format!("{:x}{:05x}", now.timestamp(), now.timestamp_subsec_millis());
    let mut rng = rand::thread_rng();
    for _ in 0..padding {
        let nibble: u32 = rng.gen_range(0..16);
        id.push(char::from_digit(nibble, 16).unwrap_or('0'));
    }
    id
}

/// Check the service's id rules: 1..=36 chars of `a-zA-Z0-9._-`, not
/// starting with a special character.
pub fn is_valid(id: &str) -> bool {
    let Some(first) = id.chars().next() else {
        return false;
    };
    id.len() <= MAX_ID_LEN
        && first.is_ascii_alphanumeric()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
