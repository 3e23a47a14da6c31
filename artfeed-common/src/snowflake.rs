//! Time-ordered 64-bit identifiers.
//!
//! Layout, most significant bit first: 42 bits of milliseconds since the
//! [`Epoch`], 10 bits of node id, 12 bits of per-millisecond sequence.

use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_BITS: u32 = 42;
pub const NODE_BITS: u32 = 10;
pub const SEQUENCE_BITS: u32 = 12;

pub const TIMESTAMP_OFFSET: u32 = NODE_BITS + SEQUENCE_BITS;
pub const NODE_OFFSET: u32 = SEQUENCE_BITS;

pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;
pub const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Node id {0} is out of range, the maximum is {MAX_NODE}")]
pub struct NodeIdOutOfRangeError(u16);

/// Identifies the process generating snowflakes. Two live processes must
/// never share a node id.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct NodeId(u16);

impl NodeId {
    #[must_use]
    pub fn new(id: u16) -> Option<Self> {
        (id <= MAX_NODE).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for NodeId {
    type Error = NodeIdOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NodeIdOutOfRangeError(value))
    }
}

impl From<NodeId> for u16 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    /// Callers guarantee `millis <= MAX_TIMESTAMP` and `sequence <= MAX_SEQUENCE`.
    #[must_use]
    fn from_parts(millis: u64, node: NodeId, sequence: u16) -> Self {
        debug_assert!(millis <= MAX_TIMESTAMP);
        debug_assert!(sequence <= MAX_SEQUENCE);

        Self::new(
            millis << TIMESTAMP_OFFSET
                | u64::from(node.get()) << NODE_OFFSET
                | u64::from(sequence),
        )
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn millis_since_epoch(self) -> u64 {
        self.0 >> TIMESTAMP_OFFSET
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn node(self) -> NodeId {
        NodeId((self.0 >> NODE_OFFSET) as u16 & MAX_NODE)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn sequence(self) -> u16 {
        self.0 as u16 & MAX_SEQUENCE
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.millis_since_epoch() as i64;
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

fn millis_since_epoch<SnowflakeEpoch: Epoch>(time: UtcDateTime) -> Result<u64, SnowflakeError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeError::TimeBeforeEpoch);
    }

    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis <= MAX_TIMESTAMP)
        .ok_or(SnowflakeError::TimestampTooLarge)
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    node: NodeId,
    last_millis: u64,
    next_sequence: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            last_millis: 0,
            next_sequence: 0,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Generated snowflakes are strictly increasing, even if the clock goes
    /// backwards or more than `MAX_SEQUENCE + 1` ids are requested within one
    /// millisecond. In those cases the timestamp part runs ahead of `time`.
    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        if millis > self.last_millis {
            self.last_millis = millis;
            self.next_sequence = 0;
        } else if self.next_sequence > MAX_SEQUENCE {
            self.last_millis += 1;
            self.next_sequence = 0;
            if self.last_millis > MAX_TIMESTAMP {
                return Err(SnowflakeError::TimestampTooLarge);
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Ok(Snowflake::from_parts(self.last_millis, self.node, sequence))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}
