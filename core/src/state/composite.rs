use super::types::TaskStatus;

/// Reduce the statuses of a composite task's leaves to one display status.
///
/// Used only for reporting. Scheduling always looks at leaves.
pub fn composite_status<I>(children: I) -> TaskStatus
where
    I: IntoIterator<Item = TaskStatus>,
{
    let mut any = false;
    let mut waiting = false;
    let mut running = false;
    let mut failed = false;
    let mut all_not_started = true;
    let mut all_skipped = true;
    let mut all_satisfied = true;

    for status in children {
        any = true;
        waiting |= status == TaskStatus::WaitingForHuman;
        running |= status == TaskStatus::Running;
        failed |= status == TaskStatus::Failed;
        all_not_started &= status == TaskStatus::NotStarted;
        all_skipped &= status == TaskStatus::Skipped;
        all_satisfied &= status.satisfies_prerequisite();
    }

    if !any || all_not_started {
        TaskStatus::NotStarted
    } else if waiting {
        TaskStatus::WaitingForHuman
    } else if running {
        TaskStatus::Running
    } else if all_skipped {
        TaskStatus::Skipped
    } else if all_satisfied {
        TaskStatus::Done
    } else if failed {
        TaskStatus::Failed
    } else {
        // Some leaves finished, others have not started yet.
        TaskStatus::Running
    }
}
