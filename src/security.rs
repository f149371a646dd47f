//! WS-UsernameToken validation.
//!
//! Verification order: credential lookup, Created freshness, nonce replay
//! check, password, nonce commit. The replay check and the commit happen
//! under one lock on the shared cache, so two concurrent requests carrying
//! the same nonce cannot both be accepted. Nonces of rejected requests are
//! never recorded.

use crate::error::{AuthError, ParseError};
use crate::nonce::NonceCache;
use crate::parser::element_text;
use crate::store::CredentialStore;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Marker identifying the digest password type.
pub const PASSWORD_DIGEST_MARKER: &str = "PasswordDigest";

/// Default accepted clock skew between client and server.
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 300;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// WS-Security UsernameToken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameToken {
    pub username: String,
    /// Plaintext password or base64 digest
    pub password: String,
    /// Base64 nonce; empty when absent
    pub nonce: String,
    /// `YYYY-MM-DDTHH:MM:SSZ`; empty when absent
    pub created: String,
    pub is_digest: bool,
}

/// Extract a UsernameToken from a SOAP header fragment.
pub fn extract_token(header: &str) -> Result<UsernameToken, ParseError> {
    let username = element_text(header, "Username").ok_or(ParseError::MissingCredentials)?;
    let password = element_text(header, "Password").ok_or(ParseError::MissingCredentials)?;
    let is_digest = header.contains(PASSWORD_DIGEST_MARKER);

    // Digests are base64 and may be pretty-printed. Usernames and plaintext
    // passwords are matched byte for byte.
    let password = if is_digest { password.trim() } else { password };

    Ok(UsernameToken {
        username: username.to_string(),
        password: password.to_string(),
        nonce: element_text(header, "Nonce").unwrap_or("").trim().to_string(),
        created: element_text(header, "Created").unwrap_or("").trim().to_string(),
        is_digest,
    })
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` strictly.
///
/// Fields are range-checked individually; day-of-month is not checked
/// against the month length, and overflowing days roll into the next month.
pub fn parse_created(created: &str) -> Option<DateTime<Utc>> {
    let bytes = created.as_bytes();
    if bytes.len() != 20 {
        return None;
    }

    for (i, b) in bytes.iter().enumerate() {
        let ok = match i {
            4 | 7 => *b == b'-',
            10 => *b == b'T',
            13 | 16 => *b == b':',
            19 => *b == b'Z',
            _ => b.is_ascii_digit(),
        };
        if !ok {
            return None;
        }
    }

    let field = |range: std::ops::Range<usize>| -> Option<u32> { created.get(range)?.parse().ok() };
    let year = field(0..4)?;
    let month = field(5..7)?;
    let day = field(8..10)?;
    let hour = field(11..13)?;
    let minute = field(14..16)?;
    let second = field(17..19)?;

    if !(1900..=3000).contains(&year)
        || !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || hour > 23
        || minute > 59
        || second > 59
    {
        return None;
    }

    let first_of_month = NaiveDate::from_ymd_opt(year as i32, month, 1)?;
    let date = first_of_month.checked_add_signed(Duration::days(i64::from(day) - 1))?;
    let naive = date.and_hms_opt(hour, minute, second)?;
    Some(naive.and_utc())
}

/// True iff `created` parses and lies within `tolerance_secs` of `now`.
pub fn validate_timestamp(created: &str, now: DateTime<Utc>, tolerance_secs: u64) -> bool {
    match parse_created(created) {
        Some(created_at) => {
            let diff = now.signed_duration_since(created_at).num_seconds().unsigned_abs();
            diff <= tolerance_secs
        }
        None => false,
    }
}

/// `Base64(SHA1(base64decode(nonce) ++ created ++ password))`.
///
/// Returns `None` if the nonce is empty or not valid base64.
pub fn compute_digest(nonce: &str, created: &str, password: &str) -> Option<String> {
    if nonce.is_empty() {
        return None;
    }
    let nonce_bytes = STANDARD.decode(nonce).ok()?;

    let mut sha = Sha1::new();
    sha.update(&nonce_bytes);
    sha.update(created.as_bytes());
    sha.update(password.as_bytes());
    Some(STANDARD.encode(sha.finalize()))
}

fn constant_time_str_eq(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Validates UsernameTokens against a credential store and nonce cache.
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    tolerance_secs: u64,
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_TOLERANCE_SECS)
    }
}

impl SecurityValidator {
    pub fn new(tolerance_secs: u64) -> Self {
        Self { tolerance_secs }
    }

    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    /// Validate a token. On success, its nonce (if any) is recorded exactly once.
    pub fn validate<S>(
        &self,
        token: &UsernameToken,
        credentials: &S,
        nonces: &Mutex<NonceCache>,
        clock: &dyn Clock,
    ) -> Result<(), AuthError>
    where
        S: CredentialStore + ?Sized,
    {
        let credential = credentials
            .find_credential(&token.username)
            .filter(|c| c.enabled)
            .ok_or(AuthError::UnknownUser)?;

        let now = clock.now();

        if !token.created.is_empty() && !validate_timestamp(&token.created, now, self.tolerance_secs)
        {
            debug!(username = %token.username, created = %token.created, "Created outside tolerance");
            return Err(AuthError::ExpiredTimestamp);
        }

        let mut cache = nonces.lock();

        if !token.nonce.is_empty() && cache.contains(&token.nonce) {
            return Err(AuthError::ReplayedNonce);
        }

        let password_ok = if token.is_digest {
            compute_digest(&token.nonce, &token.created, &credential.password)
                .map(|expected| constant_time_str_eq(&expected, &token.password))
                .unwrap_or(false)
        } else {
            constant_time_str_eq(&token.password, &credential.password)
        };

        if !password_ok {
            return Err(AuthError::BadPassword);
        }

        if !token.nonce.is_empty() {
            cache.insert(&token.nonce, now);
        }

        Ok(())
    }
}
