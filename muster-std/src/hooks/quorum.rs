//! Quorum gate - refuse to start an activity without enough participants.

use muster_core::{ActivityMut, DEFAULT_PRIORITY, Extension, GateResult, Verdict, async_trait};

/// Vetoes `start` while the activity has fewer than `minimum` participants.
///
/// # Example
///
/// ```rust,ignore
/// registry.register_extension(MinParticipants::new(2))?;
///
/// // An empty activity now fails to start.
/// assert!(controller.start(id).await.unwrap_err().is_veto());
/// ```
#[derive(Debug, Clone)]
pub struct MinParticipants {
    name: String,
    minimum: usize,
    priority: i32,
}

impl MinParticipants {
    /// Require at least `minimum` participants.
    pub fn new(minimum: usize) -> Self {
        Self {
            name: "muster.min-participants".to_string(),
            minimum,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Override the extension name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The required participant count.
    pub fn minimum(&self) -> usize {
        self.minimum
    }
}

#[async_trait]
impl Extension for MinParticipants {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn on_activity_pre_start(&self, activity: &mut ActivityMut<'_>) -> GateResult {
        let have = activity.participant_count();
        if have < self.minimum {
            return Ok(Verdict::veto(format!(
                "needs at least {} participants, has {}",
                self.minimum, have
            )));
        }
        Ok(Verdict::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::{Activity, NewActivity};

    #[tokio::test]
    async fn test_vetoes_below_minimum() {
        let gate = MinParticipants::new(2);
        let mut activity = Activity::new(NewActivity::new("Duel", "pvp"), 4);
        activity.add_participant("p1".into()).unwrap();

        let verdict = gate
            .on_activity_pre_start(&mut ActivityMut::new(&mut activity))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::veto("needs at least 2 participants, has 1"));
    }

    #[tokio::test]
    async fn test_allows_at_minimum() {
        let gate = MinParticipants::new(2);
        let mut activity = Activity::new(NewActivity::new("Duel", "pvp"), 4);
        activity.add_participant("p1".into()).unwrap();
        activity.add_participant("p2".into()).unwrap();

        let verdict = gate
            .on_activity_pre_start(&mut ActivityMut::new(&mut activity))
            .await
            .unwrap();
        assert!(verdict.is_allow());
    }

    #[test]
    fn test_identity_defaults() {
        let gate = MinParticipants::new(3);
        assert_eq!(gate.name(), "muster.min-participants");
        assert_eq!(gate.priority(), DEFAULT_PRIORITY);
        assert_eq!(gate.minimum(), 3);

        let gate = gate.named("arena.quorum").with_priority(-10);
        assert_eq!(gate.name(), "arena.quorum");
        assert_eq!(gate.priority(), -10);
    }
}
