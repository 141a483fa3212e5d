use std::time::Duration;

/// Stats of [`Trainer::run`](super::Trainer::run).
#[derive(Clone, Debug)]
pub struct TrainerStat {
    /// The number of trainer steps.
    pub n_steps: usize,

    /// The number of records consumed.
    pub n_samples: usize,

    /// Duration of the loop.
    pub duration: Duration,
}

impl TrainerStat {
    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "steps, samples, steps/sec, samples/sec, duration [sec]\n".to_string();
        let d = self.duration.as_secs_f32();
        s += format!(
            "{}, {}, {}, {}, {}\n",
            self.n_steps,
            self.n_samples,
            self.n_steps as f32 / d,
            self.n_samples as f32 / d,
            d
        )
        .as_str();
        s
    }
}
