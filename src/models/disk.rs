use std::path::Path;

/// Average size of a model file, used for estimates before downloading
pub const AVG_MODEL_SIZE_BYTES: u64 = 91 * 1024 * 1024;

/// Rough total size of `file_count` model files
#[must_use]
pub const fn estimated_size(file_count: usize) -> u64 {
    file_count as u64 * AVG_MODEL_SIZE_BYTES
}

/// Free space available to unprivileged users on the filesystem holding `dir`
#[cfg(unix)]
#[must_use]
pub fn available_space(dir: &Path) -> Option<u64> {
    let stats = nix::sys::statvfs::statvfs(dir)
        .map_err(|e| tracing::debug!("statvfs({}) failed: {e}", dir.display()))
        .ok()?;

    #[allow(clippy::useless_conversion)]
    let available = u64::from(stats.blocks_available()) * u64::from(stats.fragment_size());
    Some(available)
}

#[cfg(not(unix))]
#[must_use]
pub fn available_space(_dir: &Path) -> Option<u64> {
    None
}

/// Whether the estimate for `file_count` files fits in the free space of `dir`
///
/// Unknown free space counts as enough.
#[must_use]
pub fn has_room_for(dir: &Path, file_count: usize) -> bool {
    available_space(dir).map_or(true, |available| available >= estimated_size(file_count))
}
