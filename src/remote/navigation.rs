//! Navigation requests from the live page.
//!
//! When the user clicks a same-origin relative link in the live page, the
//! runtime script sends the bare string `bramble-navigate:<path>` over the
//! transport instead of a protocol envelope. These helpers recognize and
//! decode that string.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of a navigation request message.
pub const NAVIGATION_PREFIX: &str = "bramble-navigate:";

/// Matches a navigation request and captures its path.
static NAVIGATION_REQUEST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^bramble-navigate:(.+)").ok());

// ============================================================================
// Public Functions
// ============================================================================

/// Returns `true` if `message` is a navigation request.
#[must_use]
pub fn is_navigation_request(message: &str) -> bool {
    navigation_path(message).is_some()
}

/// Extracts the requested path, percent-decoded.
///
/// Returns `None` if `message` is not a navigation request or the path is
/// empty.
#[must_use]
pub fn navigation_path(message: &str) -> Option<String> {
    let captures = NAVIGATION_REQUEST.as_ref()?.captures(message)?;
    let raw = captures.get(1)?.as_str();

    let path = urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(path)
}

/// Builds the navigation request message for `path`.
#[must_use]
pub fn navigation_request(path: &str) -> String {
    format!("{NAVIGATION_PREFIX}{path}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_navigation_request() {
        let message = "bramble-navigate:/foo/bar.html";
        assert!(is_navigation_request(message));
        assert_eq!(navigation_path(message).as_deref(), Some("/foo/bar.html"));
    }

    #[test]
    fn test_rejects_other_messages() {
        assert!(!is_navigation_request(r#"{"method":"Page.reload"}"#));
        assert!(navigation_path("navigate:/foo.html").is_none());
        assert!(navigation_path(" bramble-navigate:/foo.html").is_none());
        assert!(navigation_path("bramble-navigate:").is_none());
    }

    #[test]
    fn test_path_is_percent_decoded() {
        assert_eq!(
            navigation_path("bramble-navigate:/my%20page.html").as_deref(),
            Some("/my page.html")
        );
    }

    #[test]
    fn test_navigation_request_round_trip() {
        let message = navigation_request("/docs/index.html");
        assert_eq!(navigation_path(&message).as_deref(), Some("/docs/index.html"));
    }
}
