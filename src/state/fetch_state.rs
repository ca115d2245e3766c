/// Fetch state definitions for a single page request
///
/// Every page fetch walks `Pending → Retrying(n) → Succeeded | Failed`. The
/// attempt budget lives outside the state, so exhaustion is always reached
/// through an explicit transition rather than by a loop falling through.
use std::fmt;

/// Represents the progress of one page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    /// No attempt has been made yet
    Pending,

    /// `n` attempts have failed and another one is allowed
    Retrying(u32),

    /// An attempt returned a usable document
    Succeeded,

    /// The attempt budget is exhausted
    Failed,
}

impl FetchState {
    /// Returns true if no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Number of attempts that have failed so far
    pub fn failures(&self) -> u32 {
        match self {
            Self::Retrying(n) => *n,
            _ => 0,
        }
    }

    /// The 1-based number of the next attempt
    pub fn next_attempt(&self) -> u32 {
        self.failures() + 1
    }

    /// State after the current attempt succeeded
    ///
    /// Terminal states are left untouched.
    pub fn after_success(self) -> Self {
        if self.is_terminal() {
            self
        } else {
            Self::Succeeded
        }
    }

    /// State after the current attempt failed, given the total attempt budget
    ///
    /// A budget of 0 is treated as 1. Terminal states are left untouched.
    pub fn after_failure(self, max_attempts: u32) -> Self {
        if self.is_terminal() {
            return self;
        }

        let failures = self.failures() + 1;
        if failures >= max_attempts.max(1) {
            Self::Failed
        } else {
            Self::Retrying(failures)
        }
    }

    /// Returns true if `next` is reachable from this state in one step
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Retrying(1)) => true,
            (Self::Retrying(n), Self::Retrying(m)) => m == n + 1,
            (Self::Pending | Self::Retrying(_), Self::Succeeded | Self::Failed) => true,
            _ => false,
        }
    }

    /// Short label used in log events
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying(_) => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrying(n) => write!(f, "retrying({})", n),
            other => write!(f, "{}", other.label()),
        }
    }
}
