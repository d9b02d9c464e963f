use chrono::Utc;
use daqmon_common::{EventNumber, RunNumber};
use serde::Serialize;

/// Position in the data stream of the most recent event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamDataIndex {
    pub run: RunNumber,
    pub sub_run: RunNumber,
    pub event: EventNumber,
    /// Seconds since the epoch when the event was analysed.
    pub unix_time: u32,
}

impl StreamDataIndex {
    /// Index of `event` stamped with the current time.
    pub fn now(run: RunNumber, sub_run: RunNumber, event: EventNumber) -> Self {
        Self {
            run,
            sub_run,
            event,
            unix_time: u32::try_from(Utc::now().timestamp()).unwrap_or_default(),
        }
    }

    pub(crate) fn fields(&self) -> [(&'static str, u32); 4] {
        [
            ("run", self.run),
            ("sub_run", self.sub_run),
            ("event", self.event),
            ("unix_time", self.unix_time),
        ]
    }
}
