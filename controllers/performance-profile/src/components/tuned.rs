//! Tuned synthesis.
//!
//! The tuned profile text is assembled by [`TunedProfileBuilder`] from
//! typed inputs and rendered as ini sections in a fixed order, so the same
//! profile always renders byte-for-byte the same document.

use super::{
    SynthesisError, cpu_sets, hugepage_kernel_args, machine_config_labels, owner_reference,
    tuned_name,
};
use crds::{PerformanceProfile, Tuned, TunedProfile, TunedRecommend, TunedSpec};
use kube::ResourceExt;

/// Priority of the generated recommendation (lower wins over the default profile)
pub const RECOMMEND_PRIORITY: u64 = 20;

const SUMMARY: &str = "Openshift node optimized for deterministic performance at the cost of increased power consumption, focused on low latency network performance";

/// One `[section]` of a tuned profile
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: &'static str,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    fn set_if(self, condition: bool, key: &str, value: impl Into<String>) -> Self {
        if condition { self.set(key, value) } else { self }
    }
}

/// Inputs for the `openshift-node-performance-<profile>` tuned profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunedProfileBuilder {
    isolated_cpus: String,
    static_isolation: bool,
    default_hugepages_size: Option<String>,
    hugepages_args: String,
    additional_args: String,
    real_time_hint: bool,
    high_power_consumption: bool,
}

impl TunedProfileBuilder {
    /// `isolated_cpus` is the canonical CPU list of isolated CPUs
    pub fn new(isolated_cpus: impl Into<String>) -> Self {
        Self {
            isolated_cpus: isolated_cpus.into(),
            ..Default::default()
        }
    }

    /// Remove isolated CPUs from scheduler load balancing
    pub fn static_isolation(mut self, enabled: bool) -> Self {
        self.static_isolation = enabled;
        self
    }

    pub fn default_hugepages_size(mut self, size: Option<String>) -> Self {
        self.default_hugepages_size = size;
        self
    }

    /// Space-joined `hugepagesz=`/`hugepages=` pairs for unpinned pages
    pub fn hugepages_args(mut self, args: impl Into<String>) -> Self {
        self.hugepages_args = args.into();
        self
    }

    /// Space-joined user supplied kernel arguments
    pub fn additional_args(mut self, args: impl Into<String>) -> Self {
        self.additional_args = args.into();
        self
    }

    pub fn workload_hints(mut self, real_time: bool, high_power_consumption: bool) -> Self {
        self.real_time_hint = real_time;
        self.high_power_consumption = high_power_consumption;
        self
    }

    fn sections(&self) -> Vec<Section> {
        let isolcpus = if self.static_isolation {
            "isolcpus=domain,managed_irq,${isolated_cores}"
        } else {
            "isolcpus=managed_irq"
        };

        let force_latency = if self.high_power_consumption {
            "cstate.id:0|1"
        } else {
            "cstate.id:1|3"
        };

        let mut bootloader = Section::new("bootloader")
            .set(
                "cmdline_cpu_part",
                "+nohz=on rcu_nocbs=${isolated_cores} tuned.non_isolcpus=${not_isolated_cpumask} intel_pstate=disable nosoftlockup",
            )
            .set(
                "cmdline_realtime",
                format!("+tsc=nowatchdog intel_iommu=on iommu=pt {isolcpus} systemd.cpu_affinity=${{not_isolated_cores_expanded}}"),
            );

        let mut hugepages = Vec::new();
        if let Some(size) = &self.default_hugepages_size {
            hugepages.push(format!("default_hugepagesz={size}"));
        }
        if !self.hugepages_args.is_empty() {
            hugepages.push(self.hugepages_args.clone());
        }
        if !hugepages.is_empty() {
            bootloader = bootloader.set("cmdline_hugepages", format!("+ {}", hugepages.join(" ")));
        }
        bootloader = bootloader
            .set_if(
                !self.additional_args.is_empty(),
                "cmdline_additionalArg",
                format!("+ {}", self.additional_args),
            )
            .set_if(
                self.real_time_hint,
                "cmdline_realtime_hint",
                "+nohz_full=${isolated_cores} rcu_nocb_poll",
            )
            .set_if(
                self.high_power_consumption,
                "cmdline_power_performance",
                "+processor.max_cstate=1 intel_idle.max_cstate=0",
            );

        vec![
            Section::new("main")
                .set("summary", SUMMARY)
                .set("include", "openshift-node,cpu-partitioning"),
            Section::new("variables")
                .set("isolated_cores", self.isolated_cpus.clone())
                .set("not_isolated_cores_expanded", "${f:cpulist_invert:${isolated_cores_expanded}}"),
            Section::new("cpu")
                .set("force_latency", force_latency)
                .set("governor", "performance")
                .set("energy_perf_bias", "performance")
                .set("min_perf_pct", "100"),
            Section::new("vm").set("transparent_hugepages", "never"),
            Section::new("irqbalance").set("banned_cpus", "\"\""),
            Section::new("scheduler")
                .set("runtime", "0")
                .set("group.ksoftirqd", "0:f:11:*:ksoftirqd.*")
                .set("group.rcuc", "0:f:11:*:rcuc.*")
                .set("sched_min_granularity_ns", "10000000")
                .set("sched_migration_cost_ns", "5000000")
                .set("numa_balancing", "0")
                .set("default_irq_smp_affinity", "ignore"),
            Section::new("sysctl")
                .set("kernel.hung_task_timeout_secs", "600")
                .set("kernel.nmi_watchdog", "0")
                .set("kernel.sched_rt_runtime_us", "-1")
                .set("vm.stat_interval", "10")
                .set("kernel.timer_migration", if self.real_time_hint { "0" } else { "1" }),
            bootloader,
        ]
    }

    /// Renders the profile in tuned's ini format
    pub fn build(&self) -> String {
        self.sections()
            .iter()
            .map(|section| {
                let mut out = format!("[{}]\n", section.name);
                for (key, value) in &section.entries {
                    out.push_str(&format!("{key}={value}\n"));
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds `openshift-node-performance-<profile>` in `namespace`.
pub fn build(profile: &PerformanceProfile, namespace: &str) -> Result<Tuned, SynthesisError> {
    let name = tuned_name(&profile.name_any());
    let (_, isolated) = cpu_sets(profile)?;

    let hugepages = profile.spec.hugepages.as_ref();
    let hints = profile.spec.workload_hints.as_ref();

    // pairs only; the default size is a separate builder input
    let hugepages_args: Vec<String> = hugepage_kernel_args(profile)?
        .into_iter()
        .filter(|arg| !arg.starts_with("default_hugepagesz="))
        .collect();

    let data = TunedProfileBuilder::new(isolated.to_cpu_list())
        .static_isolation(!profile.balance_isolated())
        .default_hugepages_size(hugepages.and_then(|h| h.default_hugepages_size.clone()))
        .hugepages_args(hugepages_args.join(" "))
        .additional_args(profile.spec.additional_kernel_args.join(" "))
        .workload_hints(
            hints.and_then(|h| h.real_time).unwrap_or(false),
            hints.and_then(|h| h.high_power_consumption).unwrap_or(false),
        )
        .build();

    let mut tuned = Tuned::new(
        &name,
        TunedSpec {
            profile: vec![TunedProfile {
                name: name.clone(),
                data,
            }],
            recommend: vec![TunedRecommend {
                profile: name.clone(),
                priority: RECOMMEND_PRIORITY,
                machine_config_labels: machine_config_labels(profile)?,
            }],
        },
    );
    tuned.metadata.namespace = Some(namespace.to_string());
    tuned.metadata.owner_references = Some(vec![owner_reference(profile)?]);
    Ok(tuned)
}
