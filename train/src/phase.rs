use std::fmt;

/// Part of the fit loop a batch belongs to. Used as prefix of every logged metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Training,
    Validation,
    Test,
}

impl Phase {
    pub const ALL: [Self; 3] = [Self::Training, Self::Validation, Self::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Key of a value logged every step, eg. `training/mse_step`.
    pub fn step_key(self, name: &str) -> String {
        format!("{}/{name}_step", self.as_str())
    }

    /// Key of a value logged at the end of an epoch, eg. `validation/ssim_epoch`.
    pub fn epoch_key(self, name: &str) -> String {
        format!("{}/{name}_epoch", self.as_str())
    }

    /// Key of the epoch mean loss, eg. `validation/loss`.
    pub fn loss_key(self) -> String {
        format!("{}/loss", self.as_str())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
