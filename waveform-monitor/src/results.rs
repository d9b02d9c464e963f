use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use waveform_analysis::{ChannelResult, EventInfo, EventProcessor, GroupSummary};

#[derive(Serialize)]
struct EventRecord<'a> {
    #[serde(flatten)]
    info: &'a EventInfo,
    channels: Vec<&'a ChannelResult>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    groups: &'a [GroupSummary],
}

/// Writes the analysis of each event as one line of JSON.
/// Channels without samples are left out.
pub struct ResultsWriter<W: Write> {
    writer: W,
}

impl ResultsWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ResultsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, processor: &EventProcessor) -> std::io::Result<()> {
        let record = EventRecord {
            info: processor.info(),
            channels: processor.results().filter(|result| !result.empty).collect(),
            groups: if processor.parameters().sum_waveforms {
                processor.groups()
            } else {
                &[]
            },
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        writeln!(self.writer)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
