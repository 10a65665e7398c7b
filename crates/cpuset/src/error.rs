//! CPU set errors

use thiserror::Error;

/// Errors that can occur when parsing CPU lists or partitioning a topology
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CpuSetError {
    /// A list element is neither an integer nor an `a-b` range
    #[error("invalid CPU list element {token:?} in {input:?}")]
    InvalidToken {
        /// The offending element
        token: String,
        /// The whole input string
        input: String,
    },

    /// A range whose start is greater than its end
    #[error("invalid CPU range {start}-{end}: start is greater than end")]
    ReversedRange {
        /// Range start
        start: u32,
        /// Range end
        end: u32,
    },

    /// A CPU id above [`crate::set::MAX_CPU_ID`]
    #[error("CPU {cpu} is out of range, CPU ids go up to {max}")]
    CpuOutOfRange {
        /// The offending CPU id
        cpu: u32,
        /// Largest accepted CPU id
        max: u32,
    },

    /// Topology description does not describe a usable machine
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Reserved CPU count outside `[1, total - 1]`
    #[error("please specify the reserved CPU count in the range [1,{max}], got {requested}")]
    InvalidReservedCount {
        /// Requested count
        requested: i64,
        /// Largest acceptable count
        max: usize,
    },

    /// Reservation would place thread siblings of one core on both sides
    #[error("can't allocate {requested} CPUs without splitting the thread siblings of a physical core")]
    SplitsThreadSiblings {
        /// Number of CPUs requested from the node (or the whole machine)
        requested: usize,
    },

    /// A NUMA node does not hold enough CPUs for its share
    #[error("NUMA node {node} has {available} CPUs, can't reserve {requested}")]
    NodeCapacityExceeded {
        /// NUMA node id
        node: u32,
        /// CPUs requested from the node
        requested: usize,
        /// CPUs the node actually has
        available: usize,
    },
}
