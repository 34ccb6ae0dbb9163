//! Redaction of private keys and RPC credentials in logs and debug output.
//!
//! [`Redacted`] formats as `<redacted>` through `Debug`, `Display` and
//! `Serialize`. The wrapped value is only reachable through [`Redacted::expose`].

use std::fmt::{self, Debug, Display};

/// Wrapper that hides its inner value when formatted or serialized.
///
/// ```ignore
/// use bsc_swap_rs::redact::Redacted;
///
/// let key = Redacted("cde686c7...".to_string());
/// tracing::debug!(private_key = %key, "Loaded account");
/// // private_key = <redacted>
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Borrow the secret. Callers must not log the result.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}
