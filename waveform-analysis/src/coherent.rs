use crate::{RMS_FLOOR, Real, channel::ChannelSlot};
use daqmon_common::Sample;
use itertools::Itertools;

/// Sets `next_channel_dnoise` of every slot from its own and its successor's noise.
///
/// Must only be called once every slot holds the current event's result.
/// `waveforms[i]` is the waveform slot `i` was processed from. The value is
/// zero for the last slot and for any pair with an empty channel.
pub(crate) fn compute_coherent_noise(slots: &mut [ChannelSlot], waveforms: &[&[Sample]]) {
    let values: Vec<Real> = slots
        .iter()
        .zip(waveforms)
        .tuple_windows()
        .map(|((this, this_waveform), (next, next_waveform))| {
            if this.result.empty || next.result.empty {
                return 0.0;
            }
            let unscaled = this.noise.dnoise(this_waveform, &next.noise, next_waveform);
            let (this_rms, next_rms) = (this.result.rms, next.result.rms);
            if this_rms > RMS_FLOOR && next_rms > RMS_FLOOR {
                unscaled / (this_rms * this_rms + next_rms * next_rms).sqrt()
            } else {
                unscaled
            }
        })
        .collect();

    for (slot, value) in slots.iter_mut().zip(values.into_iter().chain(std::iter::repeat(0.0))) {
        slot.result.next_channel_dnoise = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnalysisParameters, TransformContext};
    use assert_approx_eq::assert_approx_eq;
    use daqmon_common::PlaneType;

    fn process_all(waveforms: &[&[Sample]]) -> Vec<ChannelSlot> {
        let parameters = AnalysisParameters {
            n_noise_samples: 100,
            ..Default::default()
        };
        let mut transform = TransformContext::default();
        waveforms
            .iter()
            .enumerate()
            .map(|(channel, waveform)| {
                let mut slot = ChannelSlot::default();
                slot.process(
                    &parameters,
                    channel as u32,
                    PlaneType::Collection,
                    waveform,
                    0.0,
                    &mut transform,
                );
                slot
            })
            .collect()
    }

    #[test]
    fn uncorrelated_neighbours() {
        let this: Vec<Sample> = (0..40).map(|i| if i % 2 == 0 { 3 } else { -3 }).collect();
        let next: Vec<Sample> = (0..40).map(|i| if i % 4 < 2 { 4 } else { -4 }).collect();
        let waveforms = [this.as_slice(), next.as_slice()];
        let mut slots = process_all(&waveforms);
        compute_coherent_noise(&mut slots, &waveforms);
        // Half the differences are 1 and half are 7.
        let raw: Real = ((1.0 + 49.0) / 2.0 as Real).sqrt();
        assert_approx_eq!(slots[0].result.next_channel_dnoise, raw / 5.0);
        assert_eq!(slots[1].result.next_channel_dnoise, 0.0);
    }

    #[test]
    fn identical_neighbours() {
        let noise: Vec<Sample> = (0..40).map(|i| (i % 5) as Sample - 2).collect();
        let waveforms = [noise.as_slice(), noise.as_slice(), noise.as_slice()];
        let mut slots = process_all(&waveforms);
        compute_coherent_noise(&mut slots, &waveforms);
        for slot in &slots {
            assert_approx_eq!(slot.result.next_channel_dnoise, 0.0);
        }
    }

    #[test]
    fn quiet_channel_is_not_scaled() {
        let quiet = [0; 10];
        let noisy: Vec<Sample> = (0..10).map(|i| if i % 2 == 0 { 2 } else { -2 }).collect();
        let waveforms = [&quiet[..], noisy.as_slice()];
        let mut slots = process_all(&waveforms);
        compute_coherent_noise(&mut slots, &waveforms);
        assert_approx_eq!(slots[0].result.next_channel_dnoise, 2.0);
    }

    #[test]
    fn empty_neighbour() {
        let noisy: Vec<Sample> = (0..10).map(|i| if i % 2 == 0 { 2 } else { -2 }).collect();
        let waveforms = [noisy.as_slice(), &[][..], noisy.as_slice()];
        let mut slots = process_all(&waveforms);
        compute_coherent_noise(&mut slots, &waveforms);
        assert!(
            slots
                .iter()
                .all(|slot| slot.result.next_channel_dnoise == 0.0)
        );
    }

    #[test]
    fn single_channel() {
        let noisy: Vec<Sample> = vec![1, -1, 1];
        let waveforms = [noisy.as_slice()];
        let mut slots = process_all(&waveforms);
        compute_coherent_noise(&mut slots, &waveforms);
        assert_eq!(slots[0].result.next_channel_dnoise, 0.0);
    }
}
