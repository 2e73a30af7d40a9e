use std::time::{Duration, Instant};

/// Per-invocation correlation and deadline carrier.
///
/// Replaces the process-global correlation ID and ambient deadline the
/// source relied on: this is constructed once per invocation and threaded
/// by reference through the credential broker, the policy engine adapter,
/// and the notification processor instead of being read from the
/// environment mid-call.
#[derive(Debug, Clone)]
pub struct Context {
    pub invocation_id: String,
    pub tenant_id: String,
    pub region: String,
    deadline: Instant,
}

/// Safety margin subtracted from the remaining host execution budget before
/// treating it as the orchestrator's own deadline.
pub const DEADLINE_SAFETY_MARGIN: Duration = Duration::from_secs(5);

impl Context {
    pub fn new(
        invocation_id: impl Into<String>,
        tenant_id: impl Into<String>,
        region: impl Into<String>,
        remaining_budget: Duration,
    ) -> Self {
        let budget = remaining_budget.saturating_sub(DEADLINE_SAFETY_MARGIN);
        Self {
            invocation_id: invocation_id.into(),
            tenant_id: tenant_id.into(),
            region: region.into(),
            deadline: Instant::now() + budget,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_safety_margin() {
        let ctx = Context::new("inv-1", "222233334444", "us-east-1", Duration::from_secs(10));
        assert!(ctx.remaining() <= Duration::from_secs(5));
        assert!(!ctx.is_expired());
    }

    #[test]
    fn zero_budget_is_immediately_expired() {
        let ctx = Context::new("inv-2", "222233334444", "us-east-1", Duration::from_secs(0));
        assert!(ctx.is_expired());
    }
}
