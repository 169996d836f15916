//! Next-poll decisions.
//!
//! A schedule looks only at the most recently fetched statuses and returns
//! either the delay before the next fetch or `None` to stop scheduling.

use std::time::Duration;

use execwatch_status::ExecutionStatus;

use crate::event::StopReason;

/// When a query keeps polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollSchedule {
    /// Poll while any observed status is non-final. Used for single
    /// executions.
    UntilFinal,
    /// Poll while any observed status is running, pending or queued. Used
    /// for document execution lists.
    WhileListActive,
}

impl PollSchedule {
    /// Whether the observed statuses warrant another fetch.
    pub fn keep_polling<'a, I>(self, statuses: I) -> bool
    where
        I: IntoIterator<Item = &'a ExecutionStatus>,
    {
        let mut statuses = statuses.into_iter();
        match self {
            Self::UntilFinal => statuses.any(|s| !s.is_final()),
            Self::WhileListActive => statuses.any(ExecutionStatus::is_list_active),
        }
    }

    /// The delay before the next fetch, or `None` to stop.
    pub fn next_delay<'a, I>(self, statuses: I, interval: Duration) -> Option<Duration>
    where
        I: IntoIterator<Item = &'a ExecutionStatus>,
    {
        self.keep_polling(statuses).then_some(interval)
    }

    /// Why a query following this schedule stopped on its own.
    pub fn stop_reason(self) -> StopReason {
        match self {
            Self::UntilFinal => StopReason::Final,
            Self::WhileListActive => StopReason::Inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const INTERVAL: Duration = Duration::from_secs(2);

    #[rstest]
    #[case("pending", Some(INTERVAL))]
    #[case("queued", Some(INTERVAL))]
    #[case("running", Some(INTERVAL))]
    #[case("approving", Some(INTERVAL))]
    #[case("paused", Some(INTERVAL))]
    #[case("mystery", Some(INTERVAL))]
    #[case("completed", None)]
    #[case("approved", None)]
    #[case("failed", None)]
    #[case("cancelled", None)]
    fn single_execution(#[case] raw: &str, #[case] expected: Option<Duration>) {
        let status = ExecutionStatus::from(raw);
        assert_eq!(PollSchedule::UntilFinal.next_delay([&status], INTERVAL), expected);
    }

    #[rstest]
    #[case(&["completed", "failed"], None)]
    #[case(&["completed", "running"], Some(INTERVAL))]
    #[case(&["paused", "approving"], None)]
    #[case(&["cancelled", "queued"], Some(INTERVAL))]
    #[case(&[], None)]
    fn document_list(#[case] raw: &[&str], #[case] expected: Option<Duration>) {
        let statuses: Vec<_> = raw.iter().map(|s| ExecutionStatus::from(*s)).collect();
        assert_eq!(
            PollSchedule::WhileListActive.next_delay(&statuses, INTERVAL),
            expected
        );
    }

    #[test]
    fn stop_reasons() {
        assert_eq!(PollSchedule::UntilFinal.stop_reason(), StopReason::Final);
        assert_eq!(
            PollSchedule::WhileListActive.stop_reason(),
            StopReason::Inactive
        );
    }
}
