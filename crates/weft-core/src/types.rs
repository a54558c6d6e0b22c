//! Scalar newtypes shared across the stack.

use std::fmt;
use std::time::Duration;

use crate::wire::{Decode, Encode, WireError, WireReader, WireWriter};

/// Additive path metric, 0..=65535.
///
/// Cost doubles as an artificial processing latency when simulating lossy
/// links: one unit of cost is interpreted as one millisecond of delay
/// before an inbound frame is handed to the routing layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(u16);

impl Cost {
    pub const ZERO: Cost = Cost(0);
    pub const MAX: Cost = Cost(u16::MAX);

    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Sum two costs, clamping at the metric ceiling.
    #[must_use]
    pub const fn saturating_add(self, other: Cost) -> Cost {
        Cost(self.0.saturating_add(other.0))
    }

    /// The simulated transmission delay this cost stands for.
    #[must_use]
    pub const fn as_delay(self) -> Duration {
        Duration::from_millis(self.0 as u64)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for Cost {
    fn encode(&self, writer: &mut WireWriter) {
        writer.write_u16(self.0);
    }
}

impl Decode for Cost {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Cost(reader.read_u16()?))
    }
}

/// Identifier carried by flooded discovery frames for replay suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u16);

impl FrameId {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl Encode for FrameId {
    fn encode(&self, writer: &mut WireWriter) {
        writer.write_u16(self.0);
    }
}

impl Decode for FrameId {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(FrameId(reader.read_u16()?))
    }
}

/// Port number distinguishing trusted-transport endpoints on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortId(u16);

impl PortId {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for PortId {
    fn encode(&self, writer: &mut WireWriter) {
        writer.write_u16(self.0);
    }
}

impl Decode for PortId {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(PortId(reader.read_u16()?))
    }
}

/// Per-socket data frame sequence number.
///
/// Ordering is a plain unsigned comparison. Sequence numbers are 16 bits
/// and increment once per data frame, so a socket that outlives 65535
/// frames wraps and the ordering comparison misbehaves. Known limitation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(u16);

impl SequenceNumber {
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// The sequence number following this one (wrapping).
    #[must_use]
    pub const fn next(self) -> SequenceNumber {
        SequenceNumber(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for SequenceNumber {
    fn encode(&self, writer: &mut WireWriter) {
        writer.write_u16(self.0);
    }
}

impl Decode for SequenceNumber {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(SequenceNumber(reader.read_u16()?))
    }
}
