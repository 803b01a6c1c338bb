use crate::rounds::RoundName;
use crate::state::{RoundStatus, RoundStatusMap};

/// First round a resume should execute, or `None` when nothing is left.
///
/// Scanning starts at the first non-pending round. Pending, failed and
/// running rounds are retried in place; a paused round was accepted, so the
/// round after it is next.
pub fn resolve_resume_point(statuses: &RoundStatusMap) -> Option<RoundName> {
    let Some(first_started) = statuses
        .iter()
        .position(|(_, status)| status != RoundStatus::Pending)
    else {
        return Some(RoundName::Round0);
    };

    for (round, status) in statuses.iter().skip(first_started) {
        match status {
            RoundStatus::Pending | RoundStatus::Failed | RoundStatus::Running => {
                return Some(round)
            }
            RoundStatus::Paused => return round.next(),
            RoundStatus::Completed => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(entries: &[(RoundName, RoundStatus)]) -> RoundStatusMap {
        let mut map = RoundStatusMap::default();
        for (round, status) in entries {
            map.set(*round, *status);
        }
        map
    }

    #[test]
    fn untouched_project_starts_at_round0() {
        assert_eq!(
            resolve_resume_point(&RoundStatusMap::default()),
            Some(RoundName::Round0)
        );
    }

    #[test]
    fn paused_round_resumes_at_next_round() {
        let map = statuses(&[
            (RoundName::Round0, RoundStatus::Completed),
            (RoundName::Round1, RoundStatus::Paused),
        ]);
        assert_eq!(resolve_resume_point(&map), Some(RoundName::Round2));

        let final_paused = statuses(&[
            (RoundName::Round0, RoundStatus::Completed),
            (RoundName::Round1, RoundStatus::Completed),
            (RoundName::Round2, RoundStatus::Completed),
            (RoundName::Round3, RoundStatus::Completed),
            (RoundName::Final, RoundStatus::Paused),
        ]);
        assert_eq!(resolve_resume_point(&final_paused), None);
    }

    #[test]
    fn failed_and_running_rounds_are_retried() {
        let failed = statuses(&[
            (RoundName::Round1, RoundStatus::Completed),
            (RoundName::Round2, RoundStatus::Failed),
        ]);
        assert_eq!(resolve_resume_point(&failed), Some(RoundName::Round2));

        let crashed = statuses(&[(RoundName::Round0, RoundStatus::Running)]);
        assert_eq!(resolve_resume_point(&crashed), Some(RoundName::Round0));
    }

    #[test]
    fn scan_starts_at_first_started_round() {
        let map = statuses(&[(RoundName::Round1, RoundStatus::Completed)]);
        assert_eq!(resolve_resume_point(&map), Some(RoundName::Round2));
    }

    #[test]
    fn all_completed_is_a_no_op() {
        let map = statuses(&RoundName::ALL.map(|round| (round, RoundStatus::Completed)));
        assert_eq!(resolve_resume_point(&map), None);
    }
}
