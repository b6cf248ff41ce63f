//! Envelope address types.

use crate::error::{Error, Result};

/// Address used in `MAIL FROM` / `RCPT TO`.
///
/// Only what would corrupt the command line is rejected; the syntax of
/// the address itself is left to the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a bare `local@domain` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty or contains characters that
    /// cannot appear inside an SMTP path. The null reverse-path (`<>`) is
    /// therefore not representable.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Extracts the envelope address from a header value.
    ///
    /// `Display Name <user@example.com>` yields `user@example.com`; a value
    /// without angle brackets is used as-is.
    ///
    /// The null reverse-path `<>` used by bounces is rejected: a notification
    /// always has a real sender and recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if the extracted address is invalid, including `<>`.
    pub fn from_header(value: &str) -> Result<Self> {
        let value = value.trim();
        let addr = match (value.rfind('<'), value.rfind('>')) {
            (Some(open), Some(close)) if open < close => &value[open + 1..close],
            _ => value,
        };
        Self::new(addr.trim())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.contains(['\r', '\n', '<', '>']) || addr.contains(char::is_whitespace) {
            return Err(Error::InvalidAddress(format!(
                "Address contains characters not allowed in an SMTP path: {addr:?}"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_local_only_address_is_accepted() {
        // Local MTAs routinely accept bare local parts.
        assert_eq!(Address::new("root").unwrap().as_str(), "root");
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_injection() {
        assert!(Address::new("a@x.com>\r\nRCPT TO:<b@y.com").is_err());
        assert!(Address::new("a b@x.com").is_err());
    }

    #[test]
    fn test_from_header_display_name() {
        let addr = Address::from_header("Url Watcher <watch@example.com>").unwrap();
        assert_eq!(addr.as_str(), "watch@example.com");
    }

    #[test]
    fn test_from_header_bare() {
        let addr = Address::from_header("  watch@example.com ").unwrap();
        assert_eq!(addr.as_str(), "watch@example.com");
    }

    #[test]
    fn test_from_header_rejects_null_path() {
        assert!(Address::from_header("Nobody <>").is_err());
        assert!(Address::from_header("<>").is_err());
        assert!(Address::new("").is_err());
    }
}
