pub struct DefaultsConfig {
    pub steps: u64,
    pub snapshot_interval: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            steps: 10_000,
            snapshot_interval: 100,
        }
    }
}
