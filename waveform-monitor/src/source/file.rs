//! Reader for binary digitiser trace files.
//!
//! A file is a header followed by fixed-size events. Header and event
//! metadata are little-endian, the traces are big-endian `u16` samples.
use daqmon_common::{Channel, EventNumber, Sample, metrics::names::SAMPLES_CLAMPED};
use metrics::counter;
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    mem::size_of,
    path::Path,
    string::FromUtf8Error,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use waveform_analysis::{ChannelWaveform, Event, Real};

#[derive(Debug, Error)]
pub enum TraceFileError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid text in header: {0}")]
    Text(#[from] FromUtf8Error),
    #[error("Invalid {field} in header: {value}")]
    InvalidCount { field: &'static str, value: i32 },
    #[error("{remainder} bytes left over after {num_events} events of {event_size} bytes")]
    PartialEvent {
        num_events: usize,
        event_size: usize,
        remainder: usize,
    },
}

/// Reads fields while counting the bytes consumed.
struct FieldReader<'a, R> {
    reader: &'a mut R,
    num_bytes: usize,
}

impl<'a, R: Read> FieldReader<'a, R> {
    fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            num_bytes: 0,
        }
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], TraceFileError> {
        let mut bytes = [0; N];
        self.reader.read_exact(&mut bytes)?;
        self.num_bytes += N;
        Ok(bytes)
    }

    fn i32(&mut self) -> Result<i32, TraceFileError> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    fn f64(&mut self) -> Result<f64, TraceFileError> {
        Ok(f64::from_le_bytes(self.bytes()?))
    }

    fn bool(&mut self) -> Result<bool, TraceFileError> {
        let [byte] = self.bytes::<1>()?;
        Ok(byte != 0)
    }

    fn count(&mut self, field: &'static str) -> Result<usize, TraceFileError> {
        let value = self.i32()?;
        usize::try_from(value).map_err(|_| TraceFileError::InvalidCount { field, value })
    }

    fn string(&mut self) -> Result<String, TraceFileError> {
        let len = self.count("string length")?;
        let mut bytes = vec![0; len];
        self.reader.read_exact(&mut bytes)?;
        self.num_bytes += len;
        Ok(String::from_utf8(bytes)?)
    }

    fn skip(&mut self, len: usize) -> Result<(), TraceFileError> {
        let copied = std::io::copy(
            &mut self.reader.by_ref().take(len as u64),
            &mut std::io::sink(),
        )?;
        if copied < len as u64 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        self.num_bytes += len;
        Ok(())
    }

    /// Reads a trace, clamping samples above `Sample::MAX`.
    /// Returns the samples and the number that were clamped.
    fn trace(&mut self, num_samples: usize) -> Result<(Vec<Sample>, usize), TraceFileError> {
        let mut bytes = vec![0; num_samples * size_of::<u16>()];
        self.reader.read_exact(&mut bytes)?;
        self.num_bytes += bytes.len();
        let mut num_clamped = 0;
        let samples = bytes
            .chunks_exact(size_of::<u16>())
            .map(|pair| {
                let value = <[u8; 2]>::try_from(pair)
                    .map(u16::from_be_bytes)
                    .unwrap_or_default();
                Sample::try_from(value).unwrap_or_else(|_| {
                    num_clamped += 1;
                    Sample::MAX
                })
            })
            .collect();
        Ok((samples, num_clamped))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraceFileHeader {
    pub program_version: String,
    pub run_description: String,
    pub num_channels: usize,
    /// Seconds between samples.
    pub sample_time: f64,
    pub num_samples: usize,
    size: usize,
}

impl TraceFileHeader {
    fn load<R: Read>(reader: &mut R) -> Result<Self, TraceFileError> {
        let mut fields = FieldReader::new(reader);
        let program_version = fields.string()?;
        let run_description = fields.string()?;
        let _resolution = fields.i32()?;
        let num_channels = fields.count("number of channels")?;
        // channel enables, volt scales and channel offsets
        fields.skip(num_channels * (size_of::<u8>() + 2 * size_of::<f64>()))?;
        let sample_time = fields.f64()?;
        let num_samples = fields.count("number of samples")?;
        // trigger settings per channel and for the external trigger
        fields.skip(num_channels * size_of::<u8>() + size_of::<u8>())?;
        fields.skip(num_channels * size_of::<f64>() + size_of::<f64>())?;
        fields.skip(num_channels * size_of::<i32>() + size_of::<i32>())?;
        Ok(Self {
            program_version,
            run_description,
            num_channels,
            sample_time,
            num_samples,
            size: fields.num_bytes,
        })
    }

    fn event_size(&self) -> usize {
        size_of::<i32>()
            + size_of::<f64>()
            + size_of::<i32>()
            + size_of::<u8>() * self.num_channels
            + size_of::<f64>()
            + size_of::<u16>() * self.num_channels * self.num_samples
    }
}

/// Sequential access to the events of a trace file.
pub struct TraceFile<R> {
    reader: R,
    header: TraceFileHeader,
    num_events: usize,
    next_event: usize,
    num_emitted: EventNumber,
    num_clamped: usize,
    cycle: bool,
    pedestal: Real,
}

impl TraceFile<BufReader<File>> {
    pub fn open(path: &Path, cycle: bool, pedestal: Real) -> Result<Self, TraceFileError> {
        let file = TraceFile::from_reader(BufReader::new(File::open(path)?), cycle, pedestal)?;
        info!(
            "Opened {}: {} events of {} channels with {} samples",
            path.display(),
            file.num_events,
            file.header.num_channels,
            file.header.num_samples
        );
        Ok(file)
    }
}

impl<R: Read + Seek> TraceFile<R> {
    /// Reads the header and checks that the rest of `reader` holds whole events.
    /// When `cycle` is set, reading restarts at the first event after the last.
    pub fn from_reader(mut reader: R, cycle: bool, pedestal: Real) -> Result<Self, TraceFileError> {
        let len = reader.seek(SeekFrom::End(0))? as usize;
        reader.seek(SeekFrom::Start(0))?;
        let header = TraceFileHeader::load(&mut reader)?;
        let event_size = header.event_size();
        let body = len.saturating_sub(header.size);
        let (num_events, remainder) = (body / event_size, body % event_size);
        if remainder != 0 {
            return Err(TraceFileError::PartialEvent {
                num_events,
                event_size,
                remainder,
            });
        }
        Ok(Self {
            reader,
            header,
            num_events,
            next_event: 0,
            num_emitted: 0,
            num_clamped: 0,
            cycle,
            pedestal,
        })
    }

    pub fn header(&self) -> &TraceFileHeader {
        &self.header
    }

    pub fn num_events(&self) -> usize {
        self.num_events
    }

    /// Samples read so far that were too large for a [Sample] and were clamped.
    pub fn num_clamped(&self) -> usize {
        self.num_clamped
    }

    /// Returns the next event, or `None` once the file is exhausted.
    /// Events are numbered in the order they are returned.
    #[instrument(skip_all, level = "debug", fields(next_event = self.next_event))]
    pub fn next_event(&mut self) -> Result<Option<Event>, TraceFileError> {
        if self.next_event >= self.num_events {
            if !self.cycle || self.num_events == 0 {
                return Ok(None);
            }
            debug!("Returning to the first event");
            self.next_event = 0;
        }
        let offset = self.header.size + self.next_event * self.header.event_size();
        self.reader.seek(SeekFrom::Start(offset as u64))?;

        let num_channels = self.header.num_channels;
        let mut fields = FieldReader::new(&mut self.reader);
        let _trace_event = fields.i32()?;
        let _runtime = fields.f64()?;
        let _num_saved = fields.i32()?;
        let saved = (0..num_channels)
            .map(|_| fields.bool())
            .collect::<Result<Vec<_>, _>>()?;
        let _trigger_time = fields.f64()?;

        let mut waveforms = Vec::with_capacity(num_channels);
        for (channel, saved) in saved.into_iter().enumerate() {
            let (samples, num_clamped) = fields.trace(self.header.num_samples)?;
            if saved && num_clamped > 0 {
                if self.num_clamped == 0 {
                    warn!(
                        "Event {} channel {channel}: {num_clamped} samples above {} clamped",
                        self.num_emitted,
                        Sample::MAX
                    );
                }
                self.num_clamped += num_clamped;
                counter!(SAMPLES_CLAMPED).increment(num_clamped as u64);
            }
            if saved {
                waveforms.push(ChannelWaveform::new(
                    channel as Channel,
                    self.pedestal,
                    samples,
                ));
            }
        }

        self.next_event += 1;
        let number = self.num_emitted;
        self.num_emitted = self.num_emitted.wrapping_add(1);
        Ok(Some(Event { number, waveforms }))
    }
}
