use std::time::Duration;

/// Stats of [`ParameterServer::run`](super::ParameterServer::run).
#[derive(Clone, Debug)]
pub struct ParameterServerStat {
    /// Number of steps of the run loop.
    pub n_steps: usize,

    /// Number of requests served.
    pub n_requests: usize,

    /// Version of the store at the end of the run.
    pub version: u64,

    /// Duration of the run.
    pub duration: Duration,
}

impl ParameterServerStat {
    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let d = self.duration.as_secs_f32();
        let mut s = "steps, requests, requests/sec, version, duration\n".to_string();
        s += format!(
            "{}, {}, {}, {}, {}\n",
            self.n_steps,
            self.n_requests,
            self.n_requests as f32 / d.max(f32::EPSILON),
            self.version,
            d
        )
        .as_str();
        s
    }
}
