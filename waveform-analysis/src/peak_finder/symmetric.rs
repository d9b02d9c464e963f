use super::PeakSink;
use crate::{Peak, Real, peak::charge_weighted_width};
use daqmon_common::Sample;

/// Mean of each sample and up to `half_width` neighbours either side.
/// The window is truncated at the ends of the waveform.
fn smooth(waveform: &[Sample], half_width: usize) -> Vec<Real> {
    let mut cumulative = Vec::with_capacity(waveform.len() + 1);
    cumulative.push(0.0);
    let mut total = 0.0;
    for &sample in waveform {
        total += Real::from(sample);
        cumulative.push(total);
    }
    (0..waveform.len())
        .map(|index| {
            let first = index.saturating_sub(half_width);
            let last = (index + half_width + 1).min(waveform.len());
            (cumulative[last] - cumulative[first]) / (last - first) as Real
        })
        .collect()
}

/// Finds regions where the smoothed waveform stays above `baseline + threshold`
/// for at least `n_above` consecutive samples.
pub(super) fn find_peaks(
    waveform: &[Sample],
    baseline: Real,
    threshold: Real,
    n_smoothing: usize,
    n_above: usize,
    sink: &mut PeakSink,
) {
    let smoothed = smooth(waveform, n_smoothing);
    let level = baseline + threshold;
    let min_length = n_above.max(1);

    let mut emit = |start: usize, end: usize| {
        if end + 1 - start < min_length {
            return;
        }
        let values: Vec<Real> = smoothed[start..=end]
            .iter()
            .map(|value| value - baseline)
            .collect();
        let (offset, amplitude) = values.iter().copied().enumerate().fold(
            (0, Real::MIN),
            |(best, max), (offset, value)| {
                if value > max { (offset, value) } else { (best, max) }
            },
        );
        let peak_index = start + offset;
        sink.push(Peak {
            start_index: start,
            end_index: end,
            peak_index,
            peak_time: peak_index as Real,
            amplitude,
            integrated_charge: values.iter().sum(),
            width_rms: charge_weighted_width(&values, start, peak_index),
        });
    };

    let mut open: Option<usize> = None;
    for (index, &value) in smoothed.iter().enumerate() {
        if value > level {
            open.get_or_insert(index);
        } else if let Some(start) = open.take() {
            emit(start, index - 1);
        }
    }
    if let Some(start) = open {
        emit(start, smoothed.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peak_finder::collect_peaks;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn smoothing_truncates_at_edges() {
        let smoothed = smooth(&[3, 6, 9, 12], 1);
        assert_approx_eq!(smoothed[0], 4.5);
        assert_approx_eq!(smoothed[1], 6.0);
        assert_approx_eq!(smoothed[3], 10.5);
        assert_eq!(smooth(&[3, 6], 0), vec![3.0, 6.0]);
    }

    #[test]
    fn flat_waveform_has_no_peaks() {
        let peaks = collect_peaks(|sink| find_peaks(&[100; 50], 100.0, 5.0, 2, 1, sink));
        assert!(peaks.is_empty());
    }

    #[test]
    fn two_separated_pulses() {
        let mut waveform = vec![0; 60];
        waveform[10..15].copy_from_slice(&[10, 40, 50, 40, 10]);
        waveform[40..43].copy_from_slice(&[30, 30, 30]);
        let peaks = collect_peaks(|sink| find_peaks(&waveform, 0.0, 5.0, 0, 2, sink));
        assert_eq!(peaks.len(), 2);
        assert_eq!((peaks[0].start_index, peaks[0].end_index), (10, 14));
        assert_eq!((peaks[1].start_index, peaks[1].end_index), (40, 42));
        assert_eq!(peaks[1].peak_index, 40);
        assert_approx_eq!(peaks[1].integrated_charge, 90.0);
    }

    #[test]
    fn short_excursions_are_ignored() {
        let mut waveform = vec![0; 20];
        waveform[5..7].copy_from_slice(&[50, 50]);
        let peaks = collect_peaks(|sink| find_peaks(&waveform, 0.0, 5.0, 0, 3, sink));
        assert!(peaks.is_empty());
    }

    #[test]
    fn pulse_at_end_of_waveform() {
        let mut waveform = vec![0; 20];
        waveform[17..20].copy_from_slice(&[20, 30, 40]);
        let peaks = collect_peaks(|sink| find_peaks(&waveform, 0.0, 5.0, 0, 1, sink));
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].end_index, 19);
        assert_eq!(peaks[0].amplitude, 40.0);
    }
}
