//! Email shape and domain allow-list checks.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthFlowError, Result};

/// `local@domain.tld` with no whitespace and a dot somewhere in the domain.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

// ---------------------------------------------------------------------------
// Allowed domains
// ---------------------------------------------------------------------------

/// Non-empty set of lowercase domain suffixes an email must belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AllowedDomainSet {
    domains: Vec<String>,
}

impl AllowedDomainSet {
    /// Build a set from raw entries.
    ///
    /// Entries are trimmed, lowercased, and stripped of a leading dot.
    /// Duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::InvalidConfig`] if no non-empty entry remains.
    pub fn new<I, S>(domains: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for raw in domains {
            let domain = raw.as_ref().trim().trim_start_matches('.').to_lowercase();
            if !domain.is_empty() && !normalized.contains(&domain) {
                normalized.push(domain);
            }
        }

        if normalized.is_empty() {
            return Err(AuthFlowError::InvalidConfig {
                reason: "allowed_domains must contain at least one domain".to_string(),
            });
        }

        Ok(Self {
            domains: normalized,
        })
    }

    /// Whether `domain` equals an allowed entry or is a subdomain of one.
    pub fn permits(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.domains.iter().any(|allowed| {
            domain == *allowed
                || domain
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// The normalized entries, in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for AllowedDomainSet {
    type Error = AuthFlowError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AllowedDomainSet> for Vec<String> {
    fn from(value: AllowedDomainSet) -> Self {
        value.domains
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Accepts emails of the right shape whose domain is on the allow-list.
#[derive(Debug, Clone)]
pub struct EmailDomainValidator {
    allowed: AllowedDomainSet,
}

impl EmailDomainValidator {
    pub fn new(allowed: AllowedDomainSet) -> Self {
        Self { allowed }
    }

    /// `true` iff `email` has the `local@domain.tld` shape and its domain
    /// is permitted. The domain comparison ignores case; the local part is
    /// never inspected beyond its shape.
    pub fn validate(&self, email: &str) -> bool {
        if !EMAIL_SHAPE.is_match(email) {
            return false;
        }
        match email.split_once('@') {
            Some((_, domain)) => self.allowed.permits(domain),
            None => false,
        }
    }

    /// Like [`validate`](Self::validate) but distinguishes a blank input.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::EmptyEmail`] for blank input,
    /// [`AuthFlowError::InvalidEmail`] for anything `validate` rejects.
    pub fn check(&self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(AuthFlowError::EmptyEmail);
        }
        if !self.validate(email) {
            return Err(AuthFlowError::InvalidEmail {
                email: email.to_string(),
            });
        }
        Ok(())
    }

    pub fn allowed_domains(&self) -> &AllowedDomainSet {
        &self.allowed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
