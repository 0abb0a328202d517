/// Hardware identity used to pick capability-gated (TensorRT) model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityProfile {
    /// Runtime platform code, substituted for `[R]`
    pub runtime_platform_code: i64,
    /// Hardware family code, substituted for `[C]` and matched against `capabilities`
    pub hardware_family_code: i64,
}

/// GPU family name -> hardware family code
pub const GPU_FAMILIES: &[(&str, i64)] = &[("RTX20", 705), ("RTX30", 806), ("RTX40", 809)];

/// Operating system -> runtime platform code
pub const PLATFORMS: &[(&str, i64)] = &[("windows", 8500), ("linux", 8517)];

impl CapabilityProfile {
    #[must_use]
    pub const fn new(runtime_platform_code: i64, hardware_family_code: i64) -> Self {
        Self {
            runtime_platform_code,
            hardware_family_code,
        }
    }

    /// Build a profile from a GPU family (e.g. `RTX30`) and an OS name
    ///
    /// Returns `None` when either is unknown, which disables gated variants.
    #[must_use]
    pub fn for_gpu_family(gpu_family: &str, os: &str) -> Option<Self> {
        let family = gpu_family.trim().to_ascii_uppercase();
        let hardware_family_code = GPU_FAMILIES
            .iter()
            .find(|(name, _)| *name == family)
            .map(|(_, code)| *code)?;

        let runtime_platform_code = PLATFORMS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(os))
            .map(|(_, code)| *code)?;

        Some(Self::new(runtime_platform_code, hardware_family_code))
    }

    /// Profile for a GPU family on the OS this binary runs on
    #[must_use]
    pub fn for_current_os(gpu_family: &str) -> Option<Self> {
        Self::for_gpu_family(gpu_family, std::env::consts::OS)
    }
}
