use crate::{
    index::StreamDataIndex,
    sink::OutputSink,
    stream::{Max, Mean, Rms, StreamData, Sum, VariableMean},
};
use daqmon_common::{Channel, ChannelMap, GroupIndex, Sample};
use tracing::{debug, instrument};
use waveform_analysis::{EventProcessor, Real};

const INDEX_NAME: &str = "index";

#[derive(Clone, Debug)]
pub struct MonitorOptions {
    /// Published as the stream name of every point.
    pub stream_name: String,
    /// Seconds after which published points expire, zero for never.
    pub expire: u32,
    /// Number of events expected between two updates.
    pub events_per_update: usize,
}

/// Per-channel and per-group monitoring series fed from analysed events.
///
/// Events are added with [Monitor::fill]. [Monitor::update] closes the
/// current time bucket of every series and [Monitor::publish] sends the
/// current values to an [OutputSink].
pub struct Monitor {
    options: MonitorOptions,
    rms: VariableMean,
    baseline: Mean,
    next_channel_dnoise: VariableMean,
    occupancy: Mean,
    mean_peak_height: VariableMean,
    peak_count: Sum<u64>,
    max_adc: Max<Sample>,
    baseline_stability: Rms,
    bucket_baselines: Vec<(Real, u32)>,
    group_rms: Mean,
    groups: Vec<Option<GroupIndex>>,
    index: StreamDataIndex,
}

impl Monitor {
    pub fn new(channel_map: &dyn ChannelMap, options: MonitorOptions) -> Self {
        let num_channels = channel_map.num_channels();
        let num_groups = channel_map.num_groups();
        let events_per_update = options.events_per_update.max(1);

        let mut group_rms = Mean::new(num_groups, 1);
        for group in 0..num_groups {
            let num_members = channel_map.channels_in_group(group as GroupIndex).len();
            group_rms.set_points_per_time(group, num_members * events_per_update);
        }

        Self {
            rms: VariableMean::new(num_channels),
            baseline: Mean::new(num_channels, events_per_update),
            next_channel_dnoise: VariableMean::new(num_channels),
            occupancy: Mean::new(num_channels, events_per_update),
            mean_peak_height: VariableMean::new(num_channels),
            peak_count: Sum::new(num_channels),
            max_adc: Max::new(num_channels),
            baseline_stability: Rms::new(num_channels, 1),
            bucket_baselines: vec![(0.0, 0); num_channels],
            group_rms,
            groups: (0..num_channels)
                .map(|channel| channel_map.group_of(channel as Channel))
                .collect(),
            index: StreamDataIndex::default(),
            options,
        }
    }

    /// Adds the results of the event last analysed by `processor`.
    /// Events without any samples are skipped.
    #[instrument(skip_all, level = "debug", fields(event = index.event))]
    pub fn fill(&mut self, processor: &EventProcessor, index: StreamDataIndex) {
        if processor.is_empty() {
            debug!("Skipping empty event");
            return;
        }
        self.index = index;
        for result in processor.results().filter(|result| !result.empty) {
            let channel = result.channel as usize;
            self.rms.fill(channel, 0, result.rms);
            self.baseline.fill(channel, 0, result.baseline);
            self.next_channel_dnoise
                .fill(channel, 0, result.next_channel_dnoise);
            self.occupancy.fill(channel, 0, result.occupancy);
            self.mean_peak_height
                .fill(channel, 0, result.mean_peak_height);
            self.peak_count
                .fill(channel, 0, u64::try_from(result.peaks.len()).unwrap_or(u64::MAX));
            self.max_adc.fill(channel, 0, result.max);
            if let Some((sum, count)) = self.bucket_baselines.get_mut(channel) {
                *sum += result.baseline;
                *count += 1;
            }
            if let Some(Some(group)) = self.groups.get(channel) {
                self.group_rms.fill(*group as usize, 0, result.rms);
            }
        }
    }

    /// Closes the current time bucket.
    ///
    /// The baseline stability series receives each channel's mean baseline
    /// over the bucket.
    #[instrument(skip_all, level = "debug")]
    pub fn update(&mut self) {
        for (channel, (sum, count)) in self.bucket_baselines.iter_mut().enumerate() {
            if *count > 0 {
                self.baseline_stability
                    .fill(channel, 0, *sum / Real::from(*count));
            }
            *sum = 0.0;
            *count = 0;
        }
        self.rms.update();
        self.baseline.update();
        self.next_channel_dnoise.update();
        self.occupancy.update();
        self.mean_peak_height.update();
        self.peak_count.update();
        self.max_adc.update();
        self.baseline_stability.update();
        self.group_rms.update();
    }

    /// Sends every series to `sink` and returns the number of points delivered.
    /// Delivery failures are left to the sink to report.
    #[instrument(skip_all, level = "debug")]
    pub fn publish(&self, sink: &mut OutputSink) -> usize {
        let stream = self.options.stream_name.as_str();
        let expire = self.options.expire;
        let mut num_points = 0;
        let mut send = |index: &str, metric: &str, value: Real| {
            sink.send(stream, index, metric, value, expire);
            num_points += 1;
        };

        for channel in 0..self.rms.size() {
            let index = format!("channel:{channel}");
            send(&index, "rms", self.rms.data(channel));
            send(&index, "baseline", self.baseline.data(channel));
            send(
                &index,
                "next_channel_dnoise",
                self.next_channel_dnoise.data(channel),
            );
            send(&index, "occupancy", self.occupancy.data(channel));
            send(
                &index,
                "mean_peak_height",
                self.mean_peak_height.data(channel),
            );
            send(&index, "peak_count", self.peak_count.data(channel) as Real);
            send(&index, "max_adc", self.max_adc.data(channel).into());
            send(
                &index,
                "baseline_rms",
                self.baseline_stability.data(channel),
            );
        }
        for group in 0..self.group_rms.size() {
            send(&format!("group:{group}"), "rms", self.group_rms.data(group));
        }
        for (name, value) in self.index.fields() {
            send(INDEX_NAME, name, value.into());
        }
        let num_delivered = sink.flush();
        debug!("Delivered {num_delivered} of {num_points} points");
        num_delivered
    }

    /// Forgets every series.
    pub fn clear(&mut self) {
        self.rms.clear();
        self.baseline.clear();
        self.next_channel_dnoise.clear();
        self.occupancy.clear();
        self.mean_peak_height.clear();
        self.peak_count.clear();
        self.max_adc.clear();
        self.baseline_stability.clear();
        self.bucket_baselines.fill((0.0, 0));
        self.group_rms.clear();
    }

    pub fn index(&self) -> &StreamDataIndex {
        &self.index
    }
}
