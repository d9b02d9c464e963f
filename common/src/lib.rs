pub mod channel_map;
pub mod metrics;
pub mod tracer;

pub use channel_map::{ChannelMap, PlaneType, UniformChannelMap};

pub type Channel = u32;
pub type GroupIndex = u32;
pub type Sample = i16;

pub type EventNumber = u32;
pub type RunNumber = u32;

/// The default number of channels read out by one hardware group (front-end module).
pub const CHANNELS_PER_GROUP: usize = 64;
