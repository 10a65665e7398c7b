//! MachineConfig synthesis.
//!
//! Kernel type and arguments plus an Ignition payload carrying the
//! pre-boot tuning script, per-NUMA huge page allocation units and the
//! CRI-O drop-in that registers the high-performance runtime.

use super::{
    SynthesisError, cpu_sets, hugepage_kernel_args, hugepage_size_kb, machine_config_labels,
    machine_config_name, owner_reference,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::{
    FileContents, IGNITION_VERSION, Ignition, IgnitionConfig, IgnitionFile, MachineConfig,
    MachineConfigSpec, NodeUser, PerformanceProfile, Storage, Systemd, SystemdUnit,
};
use kube::ResourceExt;

pub const KERNEL_TYPE_REALTIME: &str = "realtime";
pub const KERNEL_TYPE_DEFAULT: &str = "default";

const PRE_BOOT_TUNING_SCRIPT: &str = include_str!("../../assets/scripts/pre-boot-tuning.sh");
const HUGEPAGES_ALLOCATION_SCRIPT: &str = include_str!("../../assets/scripts/hugepages-allocation.sh");
const CRIO_RUNTIMES_CONFIG: &str = include_str!("../../assets/crio/99-runtimes.conf");

const PRE_BOOT_TUNING_PATH: &str = "/usr/local/bin/pre-boot-tuning.sh";
const HUGEPAGES_ALLOCATION_PATH: &str = "/usr/local/bin/hugepages-allocation.sh";
const CRIO_RUNTIMES_CONFIG_PATH: &str = "/etc/crio/crio.conf.d/99-runtimes.conf";

const MODE_EXECUTABLE: u32 = 0o700;
const MODE_CONFIG: u32 = 0o644;

/// Arguments present on every profile, in order
const BASE_KERNEL_ARGS: [&str; 8] = [
    "nmi_watchdog=0",
    "audit=0",
    "mce=off",
    "processor.max_cstate=1",
    "idle=poll",
    "intel_idle.max_cstate=0",
    "intel_iommu=on",
    "iommu=pt",
];

/// Builds `50-performance-<profile>`.
pub fn build(profile: &PerformanceProfile) -> Result<MachineConfig, SynthesisError> {
    let name = machine_config_name(&profile.name_any());
    let mut mc = MachineConfig::new(
        &name,
        MachineConfigSpec {
            config: ignition_config(profile)?,
            kernel_arguments: kernel_arguments(profile)?,
            kernel_type: Some(kernel_type(profile).to_string()),
        },
    );
    mc.metadata.labels = Some(machine_config_labels(profile)?);
    mc.metadata.owner_references = Some(vec![owner_reference(profile)?]);
    Ok(mc)
}

fn kernel_type(profile: &PerformanceProfile) -> &'static str {
    if profile.real_time_kernel_enabled() {
        KERNEL_TYPE_REALTIME
    } else {
        KERNEL_TYPE_DEFAULT
    }
}

/// Kernel command line for the profile.
pub fn kernel_arguments(profile: &PerformanceProfile) -> Result<Vec<String>, SynthesisError> {
    let (reserved, isolated) = cpu_sets(profile)?;

    let mut args: Vec<String> = BASE_KERNEL_ARGS.iter().map(|a| a.to_string()).collect();
    // balanced isolated CPUs only keep managed IRQs away, without a CPU list
    if profile.balance_isolated() {
        args.push("isolcpus=managed_irq".to_string());
    } else {
        args.push(format!("isolcpus=domain,managed_irq,{isolated}"));
    }
    args.push(format!("systemd.cpu_affinity={reserved}"));
    args.extend(hugepage_kernel_args(profile)?);
    Ok(args)
}

fn ignition_config(profile: &PerformanceProfile) -> Result<IgnitionConfig, SynthesisError> {
    let (reserved, _) = cpu_sets(profile)?;
    let crio_config = CRIO_RUNTIMES_CONFIG.replace("{{reserved_cpus}}", &reserved.to_cpu_list());

    let files = vec![
        ignition_file(PRE_BOOT_TUNING_PATH, MODE_EXECUTABLE, PRE_BOOT_TUNING_SCRIPT),
        ignition_file(HUGEPAGES_ALLOCATION_PATH, MODE_EXECUTABLE, HUGEPAGES_ALLOCATION_SCRIPT),
        ignition_file(CRIO_RUNTIMES_CONFIG_PATH, MODE_CONFIG, &crio_config),
    ];

    let mut units = vec![SystemdUnit {
        name: "pre-boot-tuning.service".to_string(),
        enabled: Some(true),
        contents: Some(pre_boot_tuning_unit(
            &reserved.to_cpu_list(),
            &reserved.to_inverted_mask_list(),
        )),
    }];

    if let Some(hugepages) = &profile.spec.hugepages {
        for page in &hugepages.pages {
            let Some(node) = page.node else {
                continue;
            };
            let size_kb = hugepage_size_kb(&page.size)?;
            units.push(SystemdUnit {
                name: format!("hugepages-allocation-{size_kb}kB-NUMA{node}.service"),
                enabled: Some(true),
                contents: Some(hugepages_allocation_unit(size_kb, page.count, node)),
            });
        }
    }

    Ok(IgnitionConfig {
        ignition: Ignition {
            version: IGNITION_VERSION.to_string(),
        },
        storage: Some(Storage { files }),
        systemd: Some(Systemd { units }),
    })
}

fn ignition_file(path: &str, mode: u32, content: &str) -> IgnitionFile {
    IgnitionFile {
        path: path.to_string(),
        overwrite: Some(true),
        mode: Some(mode),
        user: Some(NodeUser {
            name: "root".to_string(),
        }),
        contents: FileContents {
            source: data_url(content),
        },
    }
}

/// Encodes `content` as a base64 `data:` URL
pub fn data_url(content: &str) -> String {
    format!("data:text/plain;charset=utf-8;base64,{}", STANDARD.encode(content))
}

fn pre_boot_tuning_unit(reserved_cpus: &str, reserved_mask_invert: &str) -> String {
    format!(
        "[Unit]
Description=Preboot tuning patch
Before=kubelet.service
Before=reboot.service

[Service]
Environment=RESERVED_CPUS={reserved_cpus}
Environment=RESERVED_CPU_MASK_INVERT={reserved_mask_invert}
Type=oneshot
RemainAfterExit=true
ExecStart={PRE_BOOT_TUNING_PATH}

[Install]
WantedBy=multi-user.target
"
    )
}

fn hugepages_allocation_unit(size_kb: u64, count: u32, node: u32) -> String {
    format!(
        "[Unit]
Description=Hugepages-{size_kb}kB allocation on the node {node}
Before=kubelet.service

[Service]
Environment=HUGEPAGES_COUNT={count}
Environment=HUGEPAGES_SIZE={size_kb}
Environment=NUMA_NODE={node}
Type=oneshot
RemainAfterExit=true
ExecStart={HUGEPAGES_ALLOCATION_PATH}

[Install]
WantedBy=multi-user.target
"
    )
}
