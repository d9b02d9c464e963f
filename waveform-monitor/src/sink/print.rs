use super::SinkError;
use std::io::Write;
use waveform_analysis::Real;

/// Writes one line per point. Expiry is ignored.
pub struct PrintSink {
    writer: Box<dyn Write + Send>,
    num_written: usize,
}

impl PrintSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            num_written: 0,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn send(&mut self, stream: &str, index: &str, metric: &str, value: Real) -> Result<(), SinkError> {
        writeln!(
            self.writer,
            "STREAM: {stream} AT INDEX: {index} AT LOCATION: {metric} : {value}"
        )?;
        self.num_written += 1;
        Ok(())
    }

    /// Flushes the writer and returns the number of lines written since the last flush.
    pub fn flush(&mut self) -> Result<usize, SinkError> {
        let num_written = std::mem::take(&mut self.num_written);
        self.writer.flush()?;
        Ok(num_written)
    }
}
