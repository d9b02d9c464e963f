//! The channel map is queried for channel counts, group membership and the
//! signal shape of each channel. It never takes part in feature computation.
use crate::{CHANNELS_PER_GROUP, Channel, GroupIndex};
use clap::ValueEnum;
use serde::Serialize;

/// The readout plane a channel belongs to, which determines the shape of its pulses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaneType {
    /// Bipolar response: a positive lobe followed by a negative one.
    #[default]
    Induction,
    /// Unipolar response.
    Collection,
}

pub trait ChannelMap: Send + Sync {
    fn num_channels(&self) -> usize;

    fn num_groups(&self) -> usize;

    /// Returns the hardware group reading out `channel`, or `None` if the channel is not mapped.
    fn group_of(&self, channel: Channel) -> Option<GroupIndex>;

    fn plane_type(&self, channel: Channel) -> PlaneType;

    fn contains(&self, channel: Channel) -> bool {
        (channel as usize) < self.num_channels()
    }

    /// Lists the channels of `group` in ascending order.
    fn channels_in_group(&self, group: GroupIndex) -> Vec<Channel> {
        (0..self.num_channels() as Channel)
            .filter(|&channel| self.group_of(channel) == Some(group))
            .collect()
    }
}

/// Channels are numbered contiguously, grouped in blocks of `channels_per_group`,
/// and the first `num_induction_channels` channels are on induction planes.
#[derive(Clone, Debug)]
pub struct UniformChannelMap {
    num_channels: usize,
    channels_per_group: usize,
    num_induction_channels: usize,
}

impl UniformChannelMap {
    pub fn new(
        num_channels: usize,
        channels_per_group: usize,
        num_induction_channels: usize,
    ) -> Self {
        Self {
            num_channels,
            channels_per_group: channels_per_group.max(1),
            num_induction_channels,
        }
    }
}

impl Default for UniformChannelMap {
    fn default() -> Self {
        Self::new(CHANNELS_PER_GROUP, CHANNELS_PER_GROUP, 0)
    }
}

impl ChannelMap for UniformChannelMap {
    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn num_groups(&self) -> usize {
        self.num_channels.div_ceil(self.channels_per_group)
    }

    fn group_of(&self, channel: Channel) -> Option<GroupIndex> {
        self.contains(channel)
            .then(|| (channel as usize / self.channels_per_group) as GroupIndex)
    }

    fn plane_type(&self, channel: Channel) -> PlaneType {
        if (channel as usize) < self.num_induction_channels {
            PlaneType::Induction
        } else {
            PlaneType::Collection
        }
    }

    fn channels_in_group(&self, group: GroupIndex) -> Vec<Channel> {
        let first = group as usize * self.channels_per_group;
        let last = (first + self.channels_per_group).min(self.num_channels);
        (first..last).map(|channel| channel as Channel).collect()
    }
}
