use crate::phase::Phase;

/// Bookkeeping of one fit run, passed into every step instead of living on the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    steps: [u64; 3],
    epochs: [u64; 3],
    loss_sum: [f64; 3],
    loss_count: [u64; 3],
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nr. of forward calls made in this phase.
    pub fn steps(&self, phase: Phase) -> u64 {
        self.steps[phase.index()]
    }

    /// Nr. of finished epochs in this phase.
    pub fn epochs(&self, phase: Phase) -> u64 {
        self.epochs[phase.index()]
    }

    pub(crate) fn record_step(&mut self, phase: Phase) -> u64 {
        self.steps[phase.index()] += 1;
        self.steps[phase.index()]
    }

    pub(crate) fn record_epoch(&mut self, phase: Phase) -> u64 {
        self.epochs[phase.index()] += 1;
        self.epochs[phase.index()]
    }

    pub(crate) fn record_loss(&mut self, phase: Phase, loss: f64) {
        self.loss_sum[phase.index()] += loss;
        self.loss_count[phase.index()] += 1;
    }

    /// Mean loss of the current epoch, resetting the running sum.
    pub(crate) fn take_epoch_loss(&mut self, phase: Phase) -> Option<f64> {
        let i = phase.index();
        let count = std::mem::take(&mut self.loss_count[i]);
        let sum = std::mem::take(&mut self.loss_sum[i]);
        (count > 0).then(|| sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_phase() {
        let mut session = Session::new();
        session.record_step(Phase::Training);
        session.record_step(Phase::Training);
        session.record_step(Phase::Validation);
        session.record_epoch(Phase::Training);

        assert_eq!(session.steps(Phase::Training), 2);
        assert_eq!(session.steps(Phase::Validation), 1);
        assert_eq!(session.steps(Phase::Test), 0);
        assert_eq!(session.epochs(Phase::Training), 1);
        assert_eq!(session.epochs(Phase::Validation), 0);
    }

    #[test]
    fn epoch_loss_is_mean_and_resets() {
        let mut session = Session::new();
        assert_eq!(session.take_epoch_loss(Phase::Validation), None);

        session.record_loss(Phase::Validation, 1.0);
        session.record_loss(Phase::Validation, 2.0);
        assert_eq!(session.take_epoch_loss(Phase::Validation), Some(1.5));
        assert_eq!(session.take_epoch_loss(Phase::Validation), None);
    }
}
