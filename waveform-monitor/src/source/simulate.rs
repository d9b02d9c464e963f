use clap::Args;
use daqmon_common::{Channel, ChannelMap, EventNumber, GroupIndex, PlaneType, Sample};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal, Poisson};
use thiserror::Error;
use tracing::trace;
use waveform_analysis::{ChannelWaveform, Event, Real};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid noise distribution: {0}")]
    Normal(#[from] rand_distr::NormalError),
    #[error("Invalid pulse count distribution: {0}")]
    Poisson(#[from] rand_distr::PoissonError),
}

#[derive(Clone, Debug, Args)]
pub struct SimulationParameters {
    /// Samples per channel per event.
    #[clap(long, default_value = "1000")]
    pub num_samples: usize,

    /// Level of the simulated baseline, also reported as each channel's pedestal.
    #[clap(long, default_value = "500")]
    pub pedestal: Real,

    /// Standard deviation of the independent noise of each channel.
    #[clap(long, default_value = "3")]
    pub noise_sigma: Real,

    /// Standard deviation of the noise shared by all channels of a group.
    #[clap(long, default_value = "0")]
    pub coherent_noise_sigma: Real,

    /// Mean number of pulses per channel per event.
    #[clap(long, default_value = "0.5")]
    pub pulses_per_channel: Real,

    /// Typical pulse height in ADC counts.
    #[clap(long, default_value = "150")]
    pub pulse_amplitude: Real,

    /// Width of a pulse in samples.
    #[clap(long, default_value = "4")]
    pub pulse_width: Real,

    /// Seed for reproducible events.
    #[clap(long)]
    pub seed: Option<u64>,
}

/// Generates events of gaussian noise with randomly placed pulses.
/// Collection channels receive unipolar pulses and induction channels bipolar ones.
pub struct Simulator {
    parameters: SimulationParameters,
    planes: Vec<PlaneType>,
    groups: Vec<Option<GroupIndex>>,
    num_groups: usize,
    noise: Normal<Real>,
    coherent_noise: Normal<Real>,
    pulse_count: Option<Poisson<Real>>,
    rng: StdRng,
    next_number: EventNumber,
}

impl Simulator {
    pub fn new(
        parameters: SimulationParameters,
        channel_map: &dyn ChannelMap,
    ) -> Result<Self, SimulationError> {
        let channels = 0..channel_map.num_channels() as Channel;
        let pulse_count = if parameters.pulses_per_channel > 0.0 {
            Some(Poisson::new(parameters.pulses_per_channel)?)
        } else {
            None
        };
        let rng = match parameters.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            planes: channels
                .clone()
                .map(|channel| channel_map.plane_type(channel))
                .collect(),
            groups: channels
                .map(|channel| channel_map.group_of(channel))
                .collect(),
            num_groups: channel_map.num_groups(),
            noise: Normal::new(0.0, parameters.noise_sigma)?,
            coherent_noise: Normal::new(0.0, parameters.coherent_noise_sigma)?,
            pulse_count,
            rng,
            next_number: 0,
            parameters,
        })
    }

    pub fn next_event(&mut self) -> Event {
        let num_samples = self.parameters.num_samples;
        let coherent: Vec<Vec<Real>> = (0..self.num_groups)
            .map(|_| {
                if self.parameters.coherent_noise_sigma > 0.0 {
                    (&self.coherent_noise)
                        .sample_iter(&mut self.rng)
                        .take(num_samples)
                        .collect()
                } else {
                    Vec::new()
                }
            })
            .collect();

        let mut waveforms = Vec::with_capacity(self.planes.len());
        for (channel, (&plane, group)) in self.planes.iter().zip(&self.groups).enumerate() {
            let mut values: Vec<Real> = (&self.noise)
                .sample_iter(&mut self.rng)
                .take(num_samples)
                .map(|noise| self.parameters.pedestal + noise)
                .collect();

            if let Some(shared) = group.and_then(|group| coherent.get(group as usize)) {
                for (value, shared) in values.iter_mut().zip(shared) {
                    *value += shared;
                }
            }

            let num_pulses = self
                .pulse_count
                .as_ref()
                .map(|count| count.sample(&mut self.rng) as usize)
                .unwrap_or_default();
            for _ in 0..num_pulses {
                let centre = self.rng.random_range(0.0..num_samples.max(1) as Real);
                let amplitude = self.parameters.pulse_amplitude * self.rng.random_range(0.5..1.5);
                add_pulse(&mut values, plane, centre, amplitude, self.parameters.pulse_width);
            }
            trace!("Channel {channel}: {num_pulses} pulses");

            let samples = values
                .into_iter()
                .map(|value| value.round().clamp(Sample::MIN.into(), Sample::MAX.into()) as Sample)
                .collect();
            waveforms.push(ChannelWaveform::new(
                channel as Channel,
                self.parameters.pedestal,
                samples,
            ));
        }

        let number = self.next_number;
        self.next_number = self.next_number.wrapping_add(1);
        Event { number, waveforms }
    }
}

/// Adds a gaussian pulse, or for induction channels its negated derivative,
/// scaled so that the largest excursion is `amplitude`.
fn add_pulse(values: &mut [Real], plane: PlaneType, centre: Real, amplitude: Real, width: Real) {
    let width = width.max(0.5);
    let first = (centre - 5.0 * width).floor().max(0.0) as usize;
    let last = ((centre + 5.0 * width).ceil() as usize).min(values.len());
    for (index, value) in values.iter_mut().enumerate().take(last).skip(first) {
        let x = (index as Real - centre) / width;
        *value += match plane {
            PlaneType::Collection => amplitude * (-0.5 * x * x).exp(),
            PlaneType::Induction => -amplitude * x * (0.5 - 0.5 * x * x).exp(),
        };
    }
}
