//! CPU Set Algebra
//!
//! Parsing and rendering of Linux CPU list strings (`0-3,8,10-11`), their
//! hexadecimal bitmask forms, and NUMA-aware reservation of housekeeping CPUs.
//!
//! # Example
//!
//! ```
//! use cpuset::CpuSet;
//!
//! let reserved = CpuSet::parse("3,4,53-55,61-63").unwrap();
//! assert_eq!(reserved.to_hex_mask(), "e0e0000000000018");
//! assert_eq!(reserved.to_mask_list(), "e0e00000,00000018");
//!
//! let housekeeping = CpuSet::parse("0").unwrap();
//! assert_eq!(housekeeping.to_inverted_mask_list(), "ffffffff,fffffffe");
//! ```

pub mod error;
pub mod set;
pub mod topology;

pub use error::CpuSetError;
pub use set::{CpuSet, MAX_CPU_ID};
pub use topology::{Core, NumaNode, Topology};
