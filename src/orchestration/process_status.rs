use crate::models::Queueable;
use crate::state_machine::Status;

/// What a queue listener knows about one child
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStatus {
    pub unique_id: String,
    pub name: String,
    pub status: Status,
    pub percent_complete: f64,
    /// Share of the parent's remaining progress this child accounts for
    pub work_fraction: f64,
    /// Child has started running and has not yet reached a final state
    pub operating: bool,
}

impl ProcessStatus {
    pub fn new<C: Queueable>(child: &C, work_fraction: f64) -> Self {
        Self {
            unique_id: child.unique_id().to_string(),
            name: child.name().to_string(),
            status: child.status(),
            percent_complete: child.percent_complete(),
            work_fraction,
            operating: false,
        }
    }

    /// Final and reached through processing. A child still in `NONE` has not
    /// concluded even though `NONE` counts as final.
    pub fn is_concluded(&self) -> bool {
        self.status.is_concluded()
    }
}

/// Normalized work fractions for siblings with optional runtime estimates.
/// Siblings without an estimate are weighted with the mean of the known
/// estimates; if none is known, or all known estimates are zero, every
/// sibling gets an equal share. The result sums to 1 for any non-empty input.
pub fn work_fractions(run_times: &[Option<u64>]) -> Vec<f64> {
    if run_times.is_empty() {
        return Vec::new();
    }
    let equal = || vec![1.0 / run_times.len() as f64; run_times.len()];

    let known: Vec<f64> = run_times.iter().flatten().map(|&t| t as f64).collect();
    let known_total: f64 = known.iter().sum();
    if known.is_empty() || known_total <= 0.0 {
        return equal();
    }

    let fallback = known_total / known.len() as f64;
    let weights: Vec<f64> = run_times
        .iter()
        .map(|t| t.map(|t| t as f64).unwrap_or(fallback))
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MoveAtom;
    use proptest::prelude::*;

    #[test]
    fn test_fractions_follow_run_times() {
        let fractions = work_fractions(&[Some(1), Some(1), Some(2)]);
        assert_eq!(fractions, vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_missing_estimates_use_mean() {
        let fractions = work_fractions(&[Some(100), None, Some(300)]);
        assert!((fractions[1] - 200.0 / 600.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_estimates_share_equally() {
        assert_eq!(work_fractions(&[None, None]), vec![0.5, 0.5]);
        assert_eq!(work_fractions(&[Some(0), Some(0)]), vec![0.5, 0.5]);
        assert!(work_fractions(&[]).is_empty());
    }

    #[test]
    fn test_new_status_mirrors_child() {
        let atom = MoveAtom::single("move", "x", 1.0);
        let status = ProcessStatus::new(&atom, 0.5);
        assert_eq!(status.status, Status::None);
        assert!(!status.is_concluded());
        assert!(!status.operating);
    }

    proptest! {
        #[test]
        fn prop_fractions_sum_to_one(run_times in prop::collection::vec(prop::option::of(0u64..1_000_000), 1..40)) {
            let fractions = work_fractions(&run_times);
            prop_assert_eq!(fractions.len(), run_times.len());
            let sum: f64 = fractions.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            prop_assert!(fractions.iter().all(|f| *f >= 0.0));
        }
    }
}
