//! Device path selection for new attachments.

use crate::codec::DeviceMapping;

/// First device path handed out when nothing in the `/dev/sd` range is used.
pub const BASELINE_DEVICE: &str = "/dev/sdf";

const SD_PREFIX: &str = "/dev/sd";

/// Picks the next free `/dev/sd*` path after every mapped `/dev/sd*` entry.
///
/// Entries outside the `/dev/sd` family (`/dev/xvda`, instance store) are
/// ignored. The candidate starts at [`BASELINE_DEVICE`]; whenever a mapped
/// path compares greater than or equal to it, the candidate becomes that
/// path with its final byte incremented. One pass over `mappings` is enough:
/// for single-letter names the result does not depend on their order.
///
/// The last byte is incremented without carrying, so a mapped `/dev/sdz`
/// yields `/dev/sd{`. The service rejects such a path at attach time.
#[must_use]
pub fn next_device_path(mappings: &[DeviceMapping]) -> String {
    let mut candidate = BASELINE_DEVICE.as_bytes().to_vec();
    let sd_devices = mappings
        .iter()
        .map(|entry| entry.device.as_bytes())
        .filter(|device| device.starts_with(SD_PREFIX.as_bytes()));

    for device in sd_devices {
        if device >= candidate.as_slice() {
            candidate = device.to_vec();
            if let Some(last) = candidate.last_mut() {
                *last = last.wrapping_add(1);
            }
        }
    }

    let path = String::from_utf8_lossy(&candidate).into_owned();
    if path.as_bytes().last().is_some_and(|last| !last.is_ascii_alphanumeric()) {
        tracing::warn!(device = %path, "device letters exhausted; attach is expected to fail");
    }
    path
}
