//! Hit finding for channels whose pulse shape depends on the readout plane.
//!
//! Both searches work on a baseline-subtracted signal.
use super::PeakSink;
use crate::{Peak, Real, peak::charge_weighted_width};

/// Nominal width reported for bipolar hits.
const BIPOLAR_WIDTH: Real = 5.0;

/// Unipolar pulses: contiguous runs above `threshold`.
///
/// The charge is summed over the run extended by `include_more_tail` times its
/// width on both sides.
pub(super) fn find_unipolar(
    signal: &[Real],
    threshold: Real,
    include_more_tail: Real,
    sink: &mut PeakSink,
) {
    let len = signal.len();
    let mut bin = 0;
    while bin < len {
        if signal[bin] <= threshold {
            bin += 1;
            continue;
        }
        let start = bin;
        let mut peak_index = bin;
        while bin < len && signal[bin] > threshold {
            if signal[bin] > signal[peak_index] {
                peak_index = bin;
            }
            bin += 1;
        }
        let end = bin - 1;

        let pad = (include_more_tail * (end - start) as Real).ceil().max(0.0) as usize;
        let first = start.saturating_sub(pad);
        let last = end.saturating_add(pad).min(len - 1);
        let window = &signal[first..=last];

        sink.push(Peak {
            start_index: start,
            end_index: end,
            peak_index,
            peak_time: peak_index as Real,
            amplitude: signal[peak_index],
            integrated_charge: window.iter().sum(),
            width_rms: charge_weighted_width(window, first, peak_index),
        });
        bin += 1;
    }
}

/// Bipolar pulses: a positive lobe followed by a dip below `-threshold`.
///
/// The hit time is the interpolated zero crossing between the lobes. The hit
/// starts where the positive lobe rises above `threshold` and ends where the
/// dip returns above `-threshold`. Scanning resumes once the signal is back
/// above zero.
pub(super) fn find_bipolar(signal: &[Real], threshold: Real, sink: &mut PeakSink) {
    let len = signal.len();
    let mut bin = 1;
    while bin < len {
        if signal[bin] >= -threshold {
            bin += 1;
            continue;
        }
        let dip = bin;

        let mut cursor = dip;
        while cursor > 0 && signal[cursor] <= 0.0 {
            cursor -= 1;
        }
        let before = signal[cursor];
        let after = signal.get(cursor + 1).copied().unwrap_or(before);
        let crossing = if before != after {
            cursor as Real + before / (before - after)
        } else {
            cursor as Real
        };

        while cursor > 0 && signal[cursor] < threshold {
            cursor -= 1;
        }
        if cursor >= 2 {
            cursor -= 2;
        }
        while cursor > 0 && signal[cursor] > threshold {
            cursor -= 1;
        }
        let start = (cursor + 1).min(dip);

        let mut minimum = signal[dip];
        let mut charge = 0.0;
        while bin < len && signal[bin] < -threshold {
            charge += signal[bin].abs();
            minimum = minimum.min(signal[bin]);
            bin += 1;
        }
        let end = bin - 1;

        let peak_time = crossing.clamp(start as Real, end as Real);
        sink.push(Peak {
            start_index: start,
            end_index: end,
            peak_index: (peak_time.round() as usize).clamp(start, end),
            peak_time,
            amplitude: -minimum,
            integrated_charge: charge,
            width_rms: BIPOLAR_WIDTH,
        });

        while bin < len && signal[bin] < 0.0 {
            bin += 1;
        }
        bin += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peak_finder::collect_peaks;
    use assert_approx_eq::assert_approx_eq;

    fn signal(len: usize, start: usize, values: &[Real]) -> Vec<Real> {
        let mut signal = vec![0.0; len];
        signal[start..start + values.len()].copy_from_slice(values);
        signal
    }

    #[test]
    fn rectangular_unipolar_pulse() {
        let signal = signal(30, 8, &[40.0; 6]);
        let peaks = collect_peaks(|sink| find_unipolar(&signal, 10.0, 0.0, sink));
        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert_eq!((peak.start_index, peak.end_index), (8, 13));
        assert_eq!(peak.peak_index, 8);
        assert_approx_eq!(peak.amplitude, 40.0);
        assert_approx_eq!(peak.integrated_charge, 240.0);
    }

    #[test]
    fn unipolar_tail_is_integrated() {
        let signal = signal(30, 8, &[3.0, 3.0, 20.0, 40.0, 20.0, 3.0, 3.0]);
        let narrow = collect_peaks(|sink| find_unipolar(&signal, 10.0, 0.0, sink));
        let wide = collect_peaks(|sink| find_unipolar(&signal, 10.0, 1.0, sink));
        assert_eq!(narrow[0].start_index, wide[0].start_index);
        assert_approx_eq!(narrow[0].integrated_charge, 80.0);
        assert_approx_eq!(wide[0].integrated_charge, 92.0);
        assert!(wide[0].width_rms > narrow[0].width_rms);
    }

    #[test]
    fn unipolar_single_sample_is_discarded() {
        let signal = signal(10, 4, &[50.0]);
        assert!(collect_peaks(|sink| find_unipolar(&signal, 10.0, 0.0, sink)).is_empty());
    }

    #[test]
    fn unipolar_pulse_running_off_the_end() {
        let signal = signal(10, 7, &[15.0, 25.0, 35.0]);
        let peaks = collect_peaks(|sink| find_unipolar(&signal, 10.0, 0.5, sink));
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].end_index, 9);
        assert_eq!(peaks[0].peak_index, 9);
    }

    #[test]
    fn bipolar_pulse() {
        let signal = signal(
            40,
            10,
            &[5.0, 20.0, 40.0, 20.0, -20.0, -40.0, -60.0, -30.0, -5.0],
        );
        let peaks = collect_peaks(|sink| find_bipolar(&signal, 10.0, sink));
        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert_eq!(peak.start_index, 11);
        assert_eq!(peak.end_index, 17);
        // Zero crossing halfway between indices 13 and 14.
        assert_approx_eq!(peak.peak_time, 13.5);
        assert_approx_eq!(peak.amplitude, 60.0);
        assert_approx_eq!(peak.integrated_charge, 150.0);
        assert_approx_eq!(peak.width_rms, BIPOLAR_WIDTH);
    }

    #[test]
    fn bipolar_dip_is_counted_once() {
        // The dip briefly recovers above -threshold without crossing zero.
        let signal = signal(
            40,
            10,
            &[30.0, -30.0, -30.0, -5.0, -30.0, -30.0, -5.0, 10.0],
        );
        let peaks = collect_peaks(|sink| find_bipolar(&signal, 10.0, sink));
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].end_index, 12);
    }

    #[test]
    fn two_bipolar_pulses() {
        let mut signal = signal(60, 5, &[30.0, 30.0, -30.0, -30.0]);
        signal[30..34].copy_from_slice(&[30.0, 30.0, -30.0, -30.0]);
        let peaks = collect_peaks(|sink| find_bipolar(&signal, 10.0, sink));
        assert_eq!(peaks.len(), 2);
        assert!(peaks[0].end_index < peaks[1].start_index);
    }
}
