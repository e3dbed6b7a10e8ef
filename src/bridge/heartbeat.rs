use chrono::{DateTime, Local};
use log::info;
use crate::points::PointValue;

/// What the sign of life log reports
#[derive(Debug, Default)]
pub struct Heartbeat {
    last_update: Option<DateTime<Local>>,
    last_power: PointValue,
    beats: u64,
}

impl Heartbeat {
    pub fn new() -> Self {
        return Heartbeat::default();
    }

    pub fn record(&mut self, at: DateTime<Local>, power: PointValue) {
        self.last_update = Some(at);
        self.last_power = power;
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        return self.last_update;
    }

    /// Number of sign of life logs written so far
    pub fn beats(&self) -> u64 {
        return self.beats;
    }

    pub fn report(&self) -> Vec<String> {
        let last = match self.last_update {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "never".to_string(),
        };

        return vec![
            "--- Start: sign of life ---".to_string(),
            format!("Last refresh: {last}"),
            format!("Last '/ChargePower': {}", self.last_power),
            "--- End: sign of life ---".to_string(),
        ];
    }

    pub fn log(&mut self) {
        self.beats += 1;
        for line in self.report() {
            info!("{line}");
        }
    }
}
