//! Adaptive threat scoring
//!
//! The scorer is a deterministic function over explicit input signals: no
//! hidden state, no I/O, unit-testable in isolation. Each matched signal
//! contributes its configured weight; the summed score maps to a verdict
//! through fixed thresholds, with ties rounding toward the more severe
//! verdict.
//!
//! The optional external reputation lookup is the one place I/O enters, and
//! it is wrapped in a bounded timeout that fails open to a neutral score so
//! a slow provider cannot stall the authentication pipeline.

use async_trait::async_trait;
use regex::RegexSet;

use crate::{Error, config::ThreatConfig};

/// Patterns classifying a user agent as automation. Matched
/// case-insensitively against the raw header value.
const SUSPICIOUS_AGENT_PATTERNS: &[&str] = &[
    r"(?i)bot\b",
    r"(?i)crawler",
    r"(?i)spider",
    r"(?i)\bcurl/",
    r"(?i)\bwget/",
    r"(?i)python-requests",
    r"(?i)python-urllib",
    r"(?i)go-http-client",
    r"(?i)scanner",
    r"(?i)sqlmap",
    r"(?i)nikto",
    r"(?i)nmap",
    r"(?i)masscan",
    r"(?i)headless",
    r"(?i)phantomjs",
];

/// Input signals for one authentication attempt.
#[derive(Debug, Clone, Default)]
pub struct ThreatSignals {
    /// Network address of the client, if known.
    pub ip_address: Option<String>,
    /// Raw user-agent string, if known.
    pub user_agent: Option<String>,
    /// The address is already known-bad (e.g. from a local denylist).
    pub flagged_network: bool,
    /// Recent failures recorded for this identifier inside the lockout
    /// counting window.
    pub recent_failures: u32,
    /// The attempt falls into the account's anomalous time-of-day band.
    pub off_hours: bool,
}

/// Categorical verdict derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Step-up verification required even if not normally enforced.
    Challenge,
    Block,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Challenge => "challenge",
            Verdict::Block => "block",
        }
    }
}

/// Coarse risk band for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Result of scoring one attempt.
#[derive(Debug, Clone)]
pub struct ThreatAssessment {
    pub score: u16,
    pub risk: RiskLevel,
    pub verdict: Verdict,
    /// Human-readable reasons for audit logging. Never surfaced to callers.
    pub reasons: Vec<String>,
}

/// External address-reputation provider.
///
/// Lookups are advisory: they run under a bounded timeout and any failure
/// or overrun falls open to a neutral score, unlike the authentication path
/// itself which fails closed.
#[async_trait]
pub trait ReputationLookup: Send + Sync + 'static {
    /// Reputation score for an address, 0 (clean) to 100 (known-bad).
    async fn check(&self, address: &str) -> Result<u16, Error>;
}

/// Weighted, threshold-based threat scorer.
pub struct ThreatScorer {
    config: ThreatConfig,
    agent_patterns: RegexSet,
}

impl ThreatScorer {
    pub fn new(config: ThreatConfig) -> Self {
        let agent_patterns = RegexSet::new(SUSPICIOUS_AGENT_PATTERNS)
            .expect("suspicious agent patterns are valid regexes");
        Self {
            config,
            agent_patterns,
        }
    }

    pub fn config(&self) -> &ThreatConfig {
        &self.config
    }

    /// Whether a user agent matches the automation heuristics.
    pub fn is_suspicious_agent(&self, user_agent: &str) -> bool {
        self.agent_patterns.is_match(user_agent)
    }

    /// Score a set of signals. Pure: same input, same output.
    ///
    /// Adding any positive-weight signal to an input set never decreases the
    /// resulting score (saturating arithmetic, no negative weights).
    pub fn score(&self, signals: &ThreatSignals) -> ThreatAssessment {
        let weights = &self.config.weights;
        let mut score: u16 = 0;
        let mut reasons = Vec::new();

        if signals.flagged_network {
            score = score.saturating_add(weights.flagged_network);
            reasons.push("network address has bad reputation".to_string());
        }

        if let Some(agent) = &signals.user_agent
            && self.is_suspicious_agent(agent)
        {
            score = score.saturating_add(weights.suspicious_user_agent);
            reasons.push(format!("user agent matches automation heuristics: {agent}"));
        }

        if signals.recent_failures > 0 {
            let counted = signals.recent_failures.min(self.config.max_counted_failures) as u16;
            score = score.saturating_add(weights.per_recent_failure.saturating_mul(counted));
            reasons.push(format!(
                "{} recent failure(s) for this account/address pair",
                signals.recent_failures
            ));
        }

        if signals.off_hours {
            score = score.saturating_add(weights.off_hours);
            reasons.push("attempt outside the account's usual hours".to_string());
        }

        // Ties round toward the higher-severity verdict: >= comparisons,
        // most severe first.
        let (verdict, risk) = if score >= self.config.block_critical_threshold {
            (Verdict::Block, RiskLevel::Critical)
        } else if score >= self.config.block_threshold {
            (Verdict::Block, RiskLevel::High)
        } else if score >= self.config.challenge_threshold {
            (Verdict::Challenge, RiskLevel::Medium)
        } else {
            (Verdict::Allow, RiskLevel::Low)
        };

        ThreatAssessment {
            score,
            risk,
            verdict,
            reasons,
        }
    }

    /// Resolve external reputation (if configured) and score.
    ///
    /// The lookup is bounded by `config.reputation_timeout`; on timeout or
    /// error the address is treated as neutral and scoring proceeds on the
    /// remaining signals.
    pub async fn assess(
        &self,
        signals: &ThreatSignals,
        reputation: Option<&dyn ReputationLookup>,
    ) -> ThreatAssessment {
        let mut effective = signals.clone();

        if !effective.flagged_network
            && let (Some(lookup), Some(address)) = (reputation, signals.ip_address.as_deref())
        {
            match tokio::time::timeout(self.config.reputation_timeout, lookup.check(address)).await
            {
                Ok(Ok(score)) if score >= self.config.reputation_flag_threshold => {
                    effective.flagged_network = true;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, address, "Reputation lookup failed; treating as neutral");
                }
                Err(_) => {
                    tracing::debug!(address, "Reputation lookup timed out; treating as neutral");
                }
            }
        }

        self.score(&effective)
    }
}
