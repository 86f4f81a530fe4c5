//! One-time password store for the forgot-password flow.
//!
//! Entries live in memory only and are keyed by normalized email. An entry
//! moves `issued → verified → consumed`; expiry and too many wrong guesses
//! delete it, after which the flow restarts from a fresh code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

use super::clock::Clock;
use shared::crypto::secrets_equal;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("OTP not found or expired")]
    NotFound,

    #[error("OTP has expired")]
    Expired,

    #[error("Too many failed attempts")]
    TooManyAttempts,

    #[error("Invalid OTP")]
    InvalidCode,

    #[error("OTP not verified")]
    NotVerified,
}

/// Lifetime and attempt budget of an issued code.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    issued_at: DateTime<Utc>,
    attempts: u32,
    verified: bool,
}

pub struct OtpStore {
    entries: Mutex<HashMap<String, OtpEntry>>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl OtpStore {
    pub fn new(clock: Arc<dyn Clock>, policy: OtpPolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, OtpEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues a fresh 6-digit code, replacing any outstanding entry.
    pub fn issue(&self, email: &str) -> String {
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        let entry = OtpEntry {
            code: code.clone(),
            issued_at: self.clock.now(),
            attempts: 0,
            verified: false,
        };
        self.entries().insert(key(email), entry);
        code
    }

    /// Checks a submitted code and marks the entry verified on a match.
    pub fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let key = key(email);
        let now = self.clock.now();
        let mut entries = self.entries();

        let entry = entries.get_mut(&key).ok_or(OtpError::NotFound)?;

        if now - entry.issued_at >= self.policy.ttl {
            entries.remove(&key);
            return Err(OtpError::Expired);
        }
        if entry.attempts >= self.policy.max_attempts {
            entries.remove(&key);
            return Err(OtpError::TooManyAttempts);
        }

        if secrets_equal(&entry.code, code.trim()) {
            entry.verified = true;
            return Ok(());
        }

        entry.attempts += 1;
        if entry.attempts >= self.policy.max_attempts {
            entries.remove(&key);
            Err(OtpError::TooManyAttempts)
        } else {
            Err(OtpError::InvalidCode)
        }
    }

    /// Consumes a verified entry ahead of a password reset.
    ///
    /// A verified entry is removed before the code is compared, so it never
    /// outlives a reset attempt. An unverified entry is left in place unless
    /// it has expired.
    pub fn consume_verified(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let key = key(email);
        let now = self.clock.now();
        let mut entries = self.entries();

        match entries
            .get(&key)
            .map(|entry| (entry.verified, now - entry.issued_at >= self.policy.ttl))
        {
            None => Err(OtpError::NotFound),
            Some((_, true)) => {
                entries.remove(&key);
                Err(OtpError::Expired)
            }
            Some((false, false)) => Err(OtpError::NotVerified),
            Some((true, false)) => {
                let entry = entries.remove(&key).ok_or(OtpError::NotFound)?;
                if secrets_equal(&entry.code, code.trim()) {
                    Ok(())
                } else {
                    Err(OtpError::InvalidCode)
                }
            }
        }
    }

    /// Drops any entry for the email.
    pub fn discard(&self, email: &str) {
        self.entries().remove(&key(email));
    }

    /// Removes every entry past its lifetime. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.policy.ttl;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.issued_at < ttl);
        before - entries.len()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.entries().contains_key(&key(email))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
