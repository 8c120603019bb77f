/// Day thresholds anchored on the formal notice dispatch date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Follow-up notification to the case owner.
    pub follow_up_after_days: i64,
    /// Automatic `NOTICE_SENT -> PRE_INJUNCTION` escalation.
    pub escalation_after_days: i64,
    /// Earliest moment the owner may request an injunction.
    pub injunction_after_days: i64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            follow_up_after_days: 10,
            escalation_after_days: 17,
            injunction_after_days: 10,
        }
    }
}
