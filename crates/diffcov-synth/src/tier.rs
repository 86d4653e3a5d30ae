//! Synthesis tier selection
//!
//! Tiers escalate from the strongest evidence to the weakest. Selection is a
//! pure function of [`Evidence`] so each rule can be tested on its own.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// How tests for a routine are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Replay literal patterns learned from the corpus
    PatternReplay,
    /// Strategies from declared annotations and defaults
    SignatureBased,
    /// Generic strategies with determinism checks
    GenericFallback,
}

impl Display for TierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PatternReplay => "pattern_replay",
            Self::SignatureBased => "signature_based",
            Self::GenericFallback => "generic_fallback",
        })
    }
}

/// What is known about a routine before choosing a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evidence {
    /// Learned patterns exist for the routine's class or name
    pub has_patterns: bool,
    /// Some parameter declares an annotation or a default
    pub has_signature_info: bool,
    /// The routine was located in the parsed source
    pub resolved: bool,
}

/// Pick the strongest tier the evidence supports
#[must_use]
pub fn select_tier(evidence: Evidence) -> TierKind {
    if !evidence.resolved {
        TierKind::GenericFallback
    } else if evidence.has_patterns {
        TierKind::PatternReplay
    } else if evidence.has_signature_info {
        TierKind::SignatureBased
    } else {
        TierKind::GenericFallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_win() {
        let evidence = Evidence { has_patterns: true, has_signature_info: true, resolved: true };
        assert_eq!(select_tier(evidence), TierKind::PatternReplay);
    }

    #[test]
    fn signature_without_patterns() {
        let evidence = Evidence { has_patterns: false, has_signature_info: true, resolved: true };
        assert_eq!(select_tier(evidence), TierKind::SignatureBased);
    }

    #[test]
    fn nothing_known() {
        let evidence = Evidence { resolved: true, ..Evidence::default() };
        assert_eq!(select_tier(evidence), TierKind::GenericFallback);
    }

    #[test]
    fn unresolved_always_generic() {
        let evidence = Evidence { has_patterns: true, has_signature_info: true, resolved: false };
        assert_eq!(select_tier(evidence), TierKind::GenericFallback);
    }
}
