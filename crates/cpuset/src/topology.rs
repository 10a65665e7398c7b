//! NUMA-aware reservation of housekeeping CPUs
//!
//! A [`Topology`] describes NUMA nodes, their physical cores and each core's
//! logical processors (thread siblings). [`Topology::reserve`] carves a
//! reserved set out of it, either sequentially from the lowest cores or
//! evenly across NUMA nodes, and returns the remainder as the isolated set.

use crate::error::CpuSetError;
use crate::set::CpuSet;
use tracing::{debug, warn};

/// A physical core and its logical processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    /// Core id
    pub id: u32,
    /// Logical CPU ids served by this core (thread siblings)
    pub logical_processors: Vec<u32>,
}

/// A NUMA node and its cores, ordered by core id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaNode {
    /// NUMA node id
    pub id: u32,
    /// Cores local to this node
    pub cores: Vec<Core>,
}

impl NumaNode {
    fn cpu_count(&self) -> usize {
        self.cores.iter().map(|c| c.logical_processors.len()).sum()
    }
}

/// Machine CPU topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// NUMA nodes ordered by id
    pub nodes: Vec<NumaNode>,
    /// Whether cores expose more than one logical processor
    pub hyperthreading: bool,
}

impl Topology {
    /// Builds the conventional Linux layout for `sockets × cores_per_socket`
    /// cores spread contiguously over `numa_nodes` nodes.
    ///
    /// Core `c` owns logical CPU `c`, and with hyperthreading also
    /// `c + total_cores`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuSetError::InvalidTopology`] when any dimension is zero or
    /// the cores can't be spread evenly across the NUMA nodes.
    pub fn uniform(
        sockets: u32,
        cores_per_socket: u32,
        numa_nodes: u32,
        hyperthreading: bool,
    ) -> Result<Self, CpuSetError> {
        if sockets == 0 || cores_per_socket == 0 || numa_nodes == 0 {
            return Err(CpuSetError::InvalidTopology(format!(
                "sockets ({sockets}), cores per socket ({cores_per_socket}) and NUMA nodes ({numa_nodes}) must all be positive"
            )));
        }
        let total_cores = sockets
            .checked_mul(cores_per_socket)
            .ok_or_else(|| CpuSetError::InvalidTopology("too many cores".to_string()))?;
        if total_cores % numa_nodes != 0 {
            return Err(CpuSetError::InvalidTopology(format!(
                "{total_cores} cores can't be spread evenly over {numa_nodes} NUMA nodes"
            )));
        }
        if hyperthreading && total_cores.checked_mul(2).is_none() {
            return Err(CpuSetError::InvalidTopology("too many CPUs".to_string()));
        }

        let cores_per_node = total_cores / numa_nodes;
        let nodes = (0..numa_nodes)
            .map(|node| NumaNode {
                id: node,
                cores: (node * cores_per_node..(node + 1) * cores_per_node)
                    .map(|core| {
                        let mut logical_processors = vec![core];
                        if hyperthreading {
                            logical_processors.push(core + total_cores);
                        }
                        Core {
                            id: core,
                            logical_processors,
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            nodes,
            hyperthreading,
        })
    }

    /// Every logical CPU of the machine.
    #[must_use]
    pub fn all_cpus(&self) -> CpuSet {
        self.nodes
            .iter()
            .flat_map(|n| n.cores.iter())
            .flat_map(|c| c.logical_processors.iter().copied())
            .collect()
    }

    /// Total number of logical CPUs.
    #[must_use]
    pub fn cpu_count(&self) -> usize {
        self.nodes.iter().map(NumaNode::cpu_count).sum()
    }

    /// Splits the machine into `(reserved, isolated)` sets.
    ///
    /// With `split_across_numa` each node contributes `count / nodes` CPUs
    /// and the remainder goes to the lowest-numbered nodes; otherwise CPUs
    /// are taken from the lowest cores first. Whole cores are always taken,
    /// so on a hyperthreaded machine every share must be a multiple of the
    /// sibling count.
    ///
    /// # Errors
    ///
    /// - [`CpuSetError::InvalidReservedCount`] if `count` is not in
    ///   `[1, total - 1]`.
    /// - [`CpuSetError::SplitsThreadSiblings`] if a share would split a core.
    /// - [`CpuSetError::NodeCapacityExceeded`] if a node can't hold its share.
    pub fn reserve(
        &self,
        count: i64,
        split_across_numa: bool,
    ) -> Result<(CpuSet, CpuSet), CpuSetError> {
        let total = self.cpu_count();
        let max = total.saturating_sub(1);
        let requested = usize::try_from(count)
            .ok()
            .filter(|c| (1..=max).contains(c))
            .ok_or(CpuSetError::InvalidReservedCount {
                requested: count,
                max,
            })?;

        let reserved = if split_across_numa && !self.nodes.is_empty() {
            let per_node = requested / self.nodes.len();
            let remainder = requested % self.nodes.len();
            if remainder != 0 {
                warn!(
                    "The reserved CPUs cannot be split equally across {} NUMA nodes",
                    self.nodes.len()
                );
            }

            let mut reserved = CpuSet::new();
            for (index, node) in self.nodes.iter().enumerate() {
                let share = per_node + usize::from(index < remainder);
                let available = node.cpu_count();
                if share > available {
                    return Err(CpuSetError::NodeCapacityExceeded {
                        node: node.id,
                        requested: share,
                        available,
                    });
                }
                let taken = take_whole_cores(node.cores.iter(), share)?;
                debug!("Reserved {} from NUMA node {}", taken, node.id);
                reserved = reserved.union(&taken);
            }
            reserved
        } else {
            take_whole_cores(self.nodes.iter().flat_map(|n| n.cores.iter()), requested)?
        };

        let isolated = self.all_cpus().difference(&reserved);
        Ok((reserved, isolated))
    }
}

fn take_whole_cores<'a>(
    cores: impl Iterator<Item = &'a Core>,
    share: usize,
) -> Result<CpuSet, CpuSetError> {
    let mut taken = CpuSet::new();
    for core in cores {
        if taken.len() == share {
            break;
        }
        if taken.len() + core.logical_processors.len() > share {
            return Err(CpuSetError::SplitsThreadSiblings { requested: share });
        }
        for cpu in &core.logical_processors {
            taken.insert(*cpu);
        }
    }
    Ok(taken)
}
