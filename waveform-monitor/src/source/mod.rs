//! Producers of events for the monitor.
mod file;
mod simulate;

pub use file::{TraceFile, TraceFileError, TraceFileHeader};
pub use simulate::{SimulationError, SimulationParameters, Simulator};

use std::{fs::File, io::BufReader};
use waveform_analysis::Event;

pub enum EventSource {
    File(TraceFile<BufReader<File>>),
    Simulate(Simulator),
}

impl EventSource {
    /// Returns `None` once a non-cycling file has been read to the end.
    pub fn next_event(&mut self) -> Result<Option<Event>, TraceFileError> {
        match self {
            EventSource::File(file) => file.next_event(),
            EventSource::Simulate(simulator) => Ok(Some(simulator.next_event())),
        }
    }
}
