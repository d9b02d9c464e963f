use crate::{
    AnalysisParameters, ChannelResult, Real, RunningThreshold, TransformContext,
    channel::ChannelSlot, coherent::compute_coherent_noise,
};
use daqmon_common::{
    Channel, ChannelMap, EventNumber, GroupIndex, Sample,
    metrics::names::{CHANNELS_PROCESSED, EVENTS_PROCESSED, PEAKS_FOUND},
};
use metrics::counter;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument};

/// One channel's samples in one event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelWaveform {
    pub channel: Channel,
    /// Baseline supplied by the readout, used by the pedestal baseline method.
    pub pedestal: Real,
    pub samples: Vec<Sample>,
}

impl ChannelWaveform {
    pub fn new(channel: Channel, pedestal: Real, samples: Vec<Sample>) -> Self {
        Self {
            channel,
            pedestal,
            samples,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    pub number: EventNumber,
    pub waveforms: Vec<ChannelWaveform>,
}

/// Summary of the most recently processed event.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EventInfo {
    pub number: EventNumber,
    /// Channels with a non-empty waveform.
    pub channels_present: usize,
    pub num_peaks: usize,
}

/// Sum of the baseline-subtracted waveforms of a readout group, and optionally
/// its magnitude spectrum.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: GroupIndex,
    pub summed_waveform: Vec<Real>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spectrum: Vec<Real>,
}

/// Runs the per-channel analysis over whole events.
///
/// One result slot is kept per mapped channel and reused between events.
/// Channels are processed in parallel in one contiguous chunk per worker, and
/// each chunk keeps its own [TransformContext] from one event to the next.
/// Coherent noise is computed once every channel is done.
pub struct EventProcessor {
    parameters: AnalysisParameters,
    channel_map: Box<dyn ChannelMap>,
    slots: Vec<ChannelSlot>,
    workers: Vec<TransformContext>,
    groups: Vec<GroupSummary>,
    transform: TransformContext,
    info: EventInfo,
}

impl EventProcessor {
    pub fn new(parameters: AnalysisParameters, channel_map: Box<dyn ChannelMap>) -> Self {
        let slots = (0..channel_map.num_channels())
            .map(|_| ChannelSlot::default())
            .collect();
        let groups = (0..channel_map.num_groups())
            .map(|group| GroupSummary {
                group: group as GroupIndex,
                ..Default::default()
            })
            .collect();
        let static_input_size = parameters.static_input_size().unwrap_or_default();
        let workers = (0..rayon::current_num_threads().max(1))
            .map(|_| TransformContext::new(static_input_size))
            .collect();
        let transform = TransformContext::new(static_input_size);
        Self {
            parameters,
            channel_map,
            slots,
            workers,
            groups,
            transform,
            info: EventInfo::default(),
        }
    }

    pub fn parameters(&self) -> &AnalysisParameters {
        &self.parameters
    }

    pub fn channel_map(&self) -> &dyn ChannelMap {
        self.channel_map.as_ref()
    }

    /// Analyses `event`, replacing the results of the previous one.
    ///
    /// Waveforms for channels outside the channel map are ignored. Mapped
    /// channels with no waveform in the event are left empty.
    #[instrument(skip_all, fields(event_number = event.number, num_waveforms = event.waveforms.len()))]
    pub fn process(&mut self, event: &Event) -> &EventInfo {
        let mut waveforms: Vec<Option<&ChannelWaveform>> = vec![None; self.slots.len()];
        for waveform in &event.waveforms {
            if let Some(entry) = waveforms.get_mut(waveform.channel as usize) {
                *entry = Some(waveform);
            }
        }

        let parameters = &self.parameters;
        let channel_map = self.channel_map.as_ref();
        let chunk_size = self.slots.len().div_ceil(self.workers.len()).max(1);
        self.slots
            .par_chunks_mut(chunk_size)
            .zip(waveforms.par_chunks(chunk_size))
            .zip(self.workers.par_iter_mut())
            .enumerate()
            .for_each(|(chunk, ((slots, waveforms), transform))| {
                for (offset, (slot, waveform)) in slots.iter_mut().zip(waveforms).enumerate() {
                    let channel = (chunk * chunk_size + offset) as Channel;
                    match waveform {
                        Some(waveform) => slot.process(
                            parameters,
                            channel,
                            channel_map.plane_type(channel),
                            &waveform.samples,
                            waveform.pedestal,
                            transform,
                        ),
                        None => slot.clear(channel),
                    }
                }
            });

        let samples: Vec<&[Sample]> = waveforms
            .iter()
            .map(|waveform| waveform.map_or(&[][..], |waveform| waveform.samples.as_slice()))
            .collect();
        compute_coherent_noise(&mut self.slots, &samples);

        if self.parameters.sum_waveforms {
            self.sum_groups(&samples);
        }

        self.info = EventInfo {
            number: event.number,
            channels_present: self.results().filter(|result| !result.empty).count(),
            num_peaks: self.results().map(|result| result.peaks.len()).sum(),
        };
        counter!(EVENTS_PROCESSED).increment(1);
        counter!(CHANNELS_PROCESSED).increment(self.info.channels_present as u64);
        counter!(PEAKS_FOUND).increment(self.info.num_peaks as u64);
        debug!(
            "Event {}: {} channels, {} peaks",
            self.info.number, self.info.channels_present, self.info.num_peaks
        );
        &self.info
    }

    fn sum_groups(&mut self, samples: &[&[Sample]]) {
        for group in &mut self.groups {
            group.summed_waveform.clear();
            group.spectrum.clear();
        }
        for (channel, (slot, waveform)) in self.slots.iter().zip(samples).enumerate() {
            let Some(group) = self
                .channel_map
                .group_of(channel as Channel)
                .and_then(|group| self.groups.get_mut(group as usize))
            else {
                continue;
            };
            if group.summed_waveform.len() < waveform.len() {
                group.summed_waveform.resize(waveform.len(), 0.0);
            }
            let baseline = slot.result.baseline;
            for (sum, &sample) in group.summed_waveform.iter_mut().zip(waveform.iter()) {
                *sum += Real::from(sample) - baseline;
            }
        }

        if self.parameters.fft_summed_waveforms {
            for group in &mut self.groups {
                if group.summed_waveform.is_empty() {
                    continue;
                }
                self.transform
                    .load(group.summed_waveform.iter().copied());
                self.transform.execute();
                let output_size = self.transform.output_size();
                group
                    .spectrum
                    .extend((0..output_size).map(|index| self.transform.abs_at(index)));
            }
        }
    }

    /// Results of the last event, in channel order.
    pub fn results(&self) -> impl Iterator<Item = &ChannelResult> {
        self.slots.iter().map(|slot| &slot.result)
    }

    pub fn result(&self, channel: Channel) -> Option<&ChannelResult> {
        self.slots.get(channel as usize).map(|slot| &slot.result)
    }

    /// Group sums of the last event. The sums stay empty unless waveform summing is enabled.
    pub fn groups(&self) -> &[GroupSummary] {
        &self.groups
    }

    pub fn info(&self) -> &EventInfo {
        &self.info
    }

    /// True if no channel of the last event had any samples.
    pub fn is_empty(&self) -> bool {
        self.results().all(|result| result.empty)
    }

    pub fn running_threshold(&self, channel: Channel) -> Option<&RunningThreshold> {
        self.slots
            .get(channel as usize)
            .map(|slot| &slot.running_threshold)
    }

    /// Forgets all cross-event state.
    pub fn reset_running_state(&mut self) {
        for slot in &mut self.slots {
            slot.running_threshold.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThresholdMethod;
    use assert_approx_eq::assert_approx_eq;
    use daqmon_common::UniformChannelMap;
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    fn noise(len: usize, sigma: Real, rng: &mut StdRng) -> Vec<Sample> {
        let normal = Normal::new(0.0, sigma).unwrap();
        (0..len)
            .map(|_| normal.sample(rng).round() as Sample)
            .collect()
    }

    fn event(number: EventNumber, num_channels: u32, len: usize, rng: &mut StdRng) -> Event {
        Event {
            number,
            waveforms: (0..num_channels)
                .map(|channel| ChannelWaveform::new(channel, 0.0, noise(len, 3.0, rng)))
                .collect(),
        }
    }

    fn processor(parameters: AnalysisParameters, num_channels: usize) -> EventProcessor {
        EventProcessor::new(
            parameters,
            Box::new(UniformChannelMap::new(num_channels, 4, 0)),
        )
    }

    #[test]
    fn processes_every_channel() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut processor = processor(AnalysisParameters::default(), 8);
        let mut event = event(12, 8, 200, &mut rng);
        event.waveforms[3].samples[100..104].copy_from_slice(&[300, 400, 400, 300]);

        let info = processor.process(&event).clone();
        assert_eq!(info.number, 12);
        assert_eq!(info.channels_present, 8);
        assert_eq!(info.num_peaks, 1);
        assert!(!processor.is_empty());

        let result = processor.result(3).unwrap();
        assert_eq!(result.channel, 3);
        assert_eq!(result.peaks.len(), 1);
        assert_eq!(processor.results().count(), 8);
        assert_eq!(processor.result(7).unwrap().next_channel_dnoise, 0.0);
        assert!(processor.result(0).unwrap().next_channel_dnoise > 0.0);
    }

    #[test]
    fn missing_and_unmapped_channels() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut processor = processor(AnalysisParameters::default(), 4);
        let mut event = event(1, 6, 50, &mut rng);
        event.waveforms.remove(2);

        let info = processor.process(&event).clone();
        assert_eq!(info.channels_present, 3);
        assert!(processor.result(2).unwrap().empty);
        assert!(processor.result(4).is_none());
        assert_eq!(processor.result(1).unwrap().next_channel_dnoise, 0.0);
    }

    #[test]
    fn empty_event() {
        let mut processor = processor(AnalysisParameters::default(), 4);
        processor.process(&Event::default());
        assert!(processor.is_empty());
        assert_eq!(processor.info().channels_present, 0);
    }

    #[test]
    fn previous_event_is_forgotten() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut processor = processor(AnalysisParameters::default(), 2);
        processor.process(&event(1, 2, 50, &mut rng));
        processor.process(&Event {
            number: 2,
            waveforms: vec![ChannelWaveform::new(0, 0.0, vec![1, 2, 3])],
        });
        assert!(!processor.result(0).unwrap().empty);
        assert!(processor.result(1).unwrap().empty);
    }

    #[test]
    fn running_thresholds_follow_channels() {
        let mut rng = StdRng::seed_from_u64(4);
        let parameters = AnalysisParameters {
            threshold_calc: ThresholdMethod::Running,
            n_noise_samples: 500,
            ..Default::default()
        };
        let mut processor = processor(parameters, 3);
        for number in 0..20 {
            processor.process(&event(number, 3, 500, &mut rng));
        }
        for channel in 0..3 {
            let mean = processor
                .running_threshold(channel)
                .and_then(RunningThreshold::mean_rms)
                .unwrap();
            assert_approx_eq!(mean, 3.0, 0.2);
        }
        processor.reset_running_state();
        assert_eq!(processor.running_threshold(0).unwrap().mean_rms(), None);
    }

    #[test]
    fn group_sums() {
        let parameters = AnalysisParameters {
            sum_waveforms: true,
            fft_summed_waveforms: true,
            ..Default::default()
        };
        let mut processor = processor(parameters, 6);
        let event = Event {
            number: 0,
            waveforms: (0..6)
                .map(|channel| ChannelWaveform::new(channel, 10.0, vec![channel as Sample + 10; 8]))
                .collect(),
        };
        processor.process(&event);
        let groups = processor.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].summed_waveform, vec![6.0; 8]);
        assert_eq!(groups[1].summed_waveform, vec![9.0; 8]);
        assert_eq!(groups[1].spectrum.len(), 5);
        assert_approx_eq!(groups[1].spectrum[0], 72.0);
        assert_approx_eq!(groups[1].spectrum[1], 0.0);
    }

    fn num_plans(processor: &EventProcessor) -> usize {
        processor.workers.iter().map(TransformContext::num_plans).sum()
    }

    #[test]
    fn transforms_are_planned_once() {
        let mut rng = StdRng::seed_from_u64(6);
        let parameters = AnalysisParameters {
            fft_per_channel: true,
            ..Default::default()
        };
        let mut processor = processor(parameters, 64);
        processor.process(&event(0, 64, 128, &mut rng));
        let planned = num_plans(&processor);
        assert!(planned >= 1);
        assert!(planned <= processor.workers.len());
        for number in 1..5 {
            processor.process(&event(number, 64, 128, &mut rng));
        }
        assert_eq!(num_plans(&processor), planned);
        assert_eq!(processor.result(63).unwrap().transform_real.len(), 65);
    }

    #[test]
    fn static_transform_size_matches_dynamic() {
        let mut rng = StdRng::seed_from_u64(5);
        let event = event(0, 4, 128, &mut rng);
        let spectra: Vec<Vec<Real>> = [-1, 128]
            .into_iter()
            .map(|static_input_size| {
                let mut processor = processor(
                    AnalysisParameters {
                        fft_per_channel: true,
                        static_input_size,
                        ..Default::default()
                    },
                    4,
                );
                processor.process(&event);
                processor.result(2).unwrap().transform_real.clone()
            })
            .collect();
        assert_eq!(spectra[0].len(), 65);
        assert_eq!(spectra[0], spectra[1]);
    }
}
