use burn::optim::AdamConfig;
use burn::prelude::Config;

#[derive(Config, Debug)]
pub struct TrainerConfig {
    /// Nr. of passes over the training split.
    #[config(default = 10)]
    pub max_epochs: usize,

    /// Step values are sent to the logger every this many training steps.
    #[config(default = 50)]
    pub log_every_n_steps: usize,

    /// Run the validation loop every this many epochs.
    #[config(default = 1)]
    pub check_val_every_n_epoch: usize,

    /// Seed of the backend random number generator, used for weight init.
    #[config(default = 42)]
    pub seed: u64,

    /// Cap on training batches per epoch.
    pub limit_train_batches: Option<usize>,

    /// Cap on validation batches per epoch.
    pub limit_val_batches: Option<usize>,
}

/// Adam settings plus the learning rate the adapter steps with.
#[derive(Config)]
pub struct OptimizerSpec {
    #[config(default = "AdamConfig::new()")]
    pub adam: AdamConfig,

    #[config(default = 1e-3)]
    pub learning_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainer_config_roundtrips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.json");

        let config = TrainerConfig::new()
            .with_max_epochs(3)
            .with_limit_train_batches(Some(2));
        config.save(&path).unwrap();

        let loaded = TrainerConfig::load(&path).unwrap();
        assert_eq!(loaded.max_epochs, 3);
        assert_eq!(loaded.limit_train_batches, Some(2));
        assert_eq!(loaded.log_every_n_steps, 50);
        assert_eq!(loaded.limit_val_batches, None);
    }
}
