//! Job post state machine.
//!
//! The store applies a [`Transition`] as a compare-and-set: the write only
//! lands when the stored status is one of [`Transition::allowed_from`]. Every
//! trigger (payment, scheduler, moderation) goes through that single path, so
//! two triggers racing on the same post resolve to one winner.

use serde::Serialize;

use super::domain::JobPostStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Payment confirmed for a draft.
    Activate,
    /// Moderator publishes a draft or a previously rejected post.
    Approve,
    /// Moderator takes a post down.
    Reject,
    /// Listing duration elapsed.
    Expire,
}

impl Transition {
    pub const fn target(self) -> JobPostStatus {
        match self {
            Transition::Activate | Transition::Approve => JobPostStatus::Active,
            Transition::Reject => JobPostStatus::Rejected,
            Transition::Expire => JobPostStatus::Expired,
        }
    }

    pub const fn allowed_from(self) -> &'static [JobPostStatus] {
        match self {
            Transition::Activate => &[JobPostStatus::Draft],
            Transition::Approve => &[JobPostStatus::Draft, JobPostStatus::Rejected],
            Transition::Reject => &[JobPostStatus::Draft, JobPostStatus::Active],
            Transition::Expire => &[JobPostStatus::Active],
        }
    }

    pub fn permits(self, current: JobPostStatus) -> bool {
        self.allowed_from().contains(&current)
    }

    /// Whether a post in `current` status is shown on public listings.
    pub fn is_publicly_visible(current: JobPostStatus) -> bool {
        current == JobPostStatus::Active
    }

    pub const fn label(self) -> &'static str {
        match self {
            Transition::Activate => "activate",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Expire => "expire",
        }
    }
}

/// Result of applying a transition in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome<T> {
    /// The status changed; carries the updated record.
    Applied(T),
    /// The record exists but its status did not permit the transition.
    Skipped { current: JobPostStatus },
}

impl<T> TransitionOutcome<T> {
    pub fn applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }

    pub fn updated_count(&self) -> u64 {
        u64::from(self.applied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobPostStatus; 4] = [
        JobPostStatus::Draft,
        JobPostStatus::Active,
        JobPostStatus::Expired,
        JobPostStatus::Rejected,
    ];

    #[test]
    fn activation_only_leaves_draft() {
        let permitted: Vec<_> = ALL
            .into_iter()
            .filter(|status| Transition::Activate.permits(*status))
            .collect();
        assert_eq!(permitted, vec![JobPostStatus::Draft]);
        assert_eq!(Transition::Activate.target(), JobPostStatus::Active);
    }

    #[test]
    fn expiration_only_leaves_active() {
        assert!(Transition::Expire.permits(JobPostStatus::Active));
        assert!(!Transition::Expire.permits(JobPostStatus::Draft));
        assert!(!Transition::Expire.permits(JobPostStatus::Rejected));
        assert!(!Transition::Expire.permits(JobPostStatus::Expired));
    }

    #[test]
    fn moderation_paths() {
        assert!(Transition::Approve.permits(JobPostStatus::Rejected));
        assert!(!Transition::Approve.permits(JobPostStatus::Expired));
        assert!(Transition::Reject.permits(JobPostStatus::Active));
        assert!(!Transition::Reject.permits(JobPostStatus::Expired));
    }

    #[test]
    fn no_transition_targets_draft() {
        for transition in [
            Transition::Activate,
            Transition::Approve,
            Transition::Reject,
            Transition::Expire,
        ] {
            assert_ne!(transition.target(), JobPostStatus::Draft);
            assert!(!transition.permits(transition.target()));
        }
    }

    #[test]
    fn outcome_counts() {
        let applied: TransitionOutcome<()> = TransitionOutcome::Applied(());
        let skipped: TransitionOutcome<()> = TransitionOutcome::Skipped {
            current: JobPostStatus::Active,
        };
        assert_eq!(applied.updated_count(), 1);
        assert_eq!(skipped.updated_count(), 0);
    }
}
