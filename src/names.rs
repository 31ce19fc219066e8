//! Unique credential names.
//!
//! Names embed a nanosecond stamp that is strictly increasing within the
//! process, so two tests starting in the same instant still get different
//! keys on the shared server.

use chrono::Utc;
use derive_more::Display;
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix of every generated CLI credential name. Log scanners search for it
/// to detect credentials leaking into server logs.
pub const CREDENTIAL_PREFIX: &str = "TEST-CREDENTIALS-";

/// Namespace of credential paths used by the API suites.
pub const PATH_NAMESPACE: &str = "acceptance";

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// A name that was handed out once and will not be handed out again.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialName(String);

impl CredentialName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A derived name, e.g. a certificate issued by this CA name.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> CredentialName {
        CredentialName(format!("{}{}", self.0, suffix))
    }
}

impl AsRef<str> for CredentialName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns a wall-clock nanosecond stamp greater than any returned before.
pub fn next_stamp() -> i64 {
    let now = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1_000);
    let mut last = LAST_STAMP.load(Ordering::SeqCst);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// `TEST-CREDENTIALS-<stamp>`
pub fn unique_credential_name() -> CredentialName {
    CredentialName(format!("{}{}", CREDENTIAL_PREFIX, next_stamp()))
}

/// `/acceptance/<stamp>/<suffix>`
pub fn credential_path(stamp: i64, suffix: &str) -> CredentialName {
    CredentialName(format!(
        "/{}/{}/{}",
        PATH_NAMESPACE,
        stamp,
        suffix.trim_start_matches('/')
    ))
}

/// A credential path with a fresh stamp.
pub fn unique_credential_path(suffix: &str) -> CredentialName {
    credential_path(next_stamp(), suffix)
}
