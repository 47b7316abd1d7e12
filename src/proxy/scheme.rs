//! Scheme negotiation
//!
//! An address scheme may be a preference list joined with `+`
//! (e.g. `https+http`: prefer https, fall back to http). Endpoints discovered
//! without a scheme get the first preference the policy allows.

use crate::error::ConfigError;
use std::collections::HashSet;

/// Which schemes discovered endpoints may use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemePolicy {
    /// Any scheme is acceptable
    AllowAll,
    /// Only these schemes (compared ASCII case-insensitively)
    Allowed(HashSet<String>),
}

impl SchemePolicy {
    /// Build a policy from an explicit list of schemes
    pub fn allowed<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SchemePolicy::Allowed(
            schemes
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn allows(&self, scheme: &str) -> bool {
        match self {
            SchemePolicy::AllowAll => true,
            SchemePolicy::Allowed(set) => set.contains(&scheme.to_ascii_lowercase()),
        }
    }
}

impl Default for SchemePolicy {
    fn default() -> Self {
        SchemePolicy::AllowAll
    }
}

/// Split a scheme into its ordered preference list
pub fn preferences(scheme: &str) -> Vec<&str> {
    scheme.split('+').filter(|s| !s.is_empty()).collect()
}

/// Pick the scheme to apply to an endpoint discovered without one.
///
/// A scheme without `+` is returned unchanged regardless of policy.
pub fn negotiate<'a>(scheme: &'a str, policy: &SchemePolicy) -> Result<&'a str, ConfigError> {
    if !scheme.contains('+') {
        return Ok(scheme);
    }

    let candidates = preferences(scheme);
    candidates
        .iter()
        .copied()
        .find(|candidate| policy.allows(candidate))
        .ok_or_else(|| ConfigError::SchemesRejected {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        })
}
