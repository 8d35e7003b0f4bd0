//! Principal URI helpers.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Collection of account principals.
pub const USERS_PREFIX: &str = "principals/users";
/// Collection of group principals.
pub const GROUPS_PREFIX: &str = "principals/groups";
/// Collection of circle principals.
pub const CIRCLES_PREFIX: &str = "principals/circles";
/// Collection of system principals.
pub const SYSTEM_PREFIX: &str = "principals/system";
/// Collection of public share principals.
pub const SHARES_PREFIX: &str = "principals/shares";

/// Sub-principal holding read delegates of a calendar owner.
pub const PROXY_READ: &str = "calendar-proxy-read";
/// Sub-principal holding write delegates of a calendar owner.
pub const PROXY_WRITE: &str = "calendar-proxy-write";

const FORM: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Split a path into its parent and last segment, ignoring trailing slashes.
///
/// `principals/users/alice` becomes `("principals/users", "alice")`; a path
/// without a slash has an empty parent.
pub fn split(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    }
}

/// Form-decode a URI segment: `%XX` escapes and `+` as space.
pub fn decode(segment: &str) -> String {
    let spaced = segment.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Form-encode a URI segment, the inverse of [`decode`].
pub fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, FORM)
        .to_string()
        .replace("%20", "+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split("principals/users/alice"), ("principals/users", "alice"));
        assert_eq!(split("principals/users/alice/"), ("principals/users", "alice"));
        assert_eq!(split("alice"), ("", "alice"));
        assert_eq!(
            split("principals/users/alice/calendar-proxy-read"),
            ("principals/users/alice", "calendar-proxy-read")
        );
    }

    #[test]
    fn test_encode_decode() {
        assert_eq!(encode("Sales & Marketing"), "Sales+%26+Marketing");
        assert_eq!(decode("Sales+%26+Marketing"), "Sales & Marketing");
        assert_eq!(decode("plain"), "plain");
        assert_eq!(encode("a.b-c_d"), "a.b-c_d");
    }
}
