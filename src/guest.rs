//! Read view of the target guest's disk-like devices.
//!
//! The installer and boot-configuration builder never own the guest; they
//! only need an ordered list of disk-like devices, each exposing its
//! device role and an optional per-device boot-order annotation.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Role of a disk-like device as presented to the guest.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiskRole {
    /// A regular hard disk (default)
    #[default]
    Disk,
    /// A CD-ROM drive
    Cdrom,
    /// A floppy drive
    Floppy,
}

/// A disk-like device attached to the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDevice {
    /// Backing path of the device (image file or host device node).
    pub path: Utf8PathBuf,
    /// Device role presented to the guest.
    #[serde(default)]
    pub role: DiskRole,
    /// Per-device boot-order annotation, if the caller assigned one.
    ///
    /// Per-device ordering and the global `bootorder` sequence are
    /// mutually exclusive in the target schema.
    #[serde(default)]
    pub boot_index: Option<u32>,
}

impl DiskDevice {
    /// Creates a device with the given role and no boot-order annotation.
    pub fn new(path: impl Into<Utf8PathBuf>, role: DiskRole) -> Self {
        Self {
            path: path.into(),
            role,
            boot_index: None,
        }
    }
}

/// Ordered read view of the guest the installer targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    /// Guest name, used only for diagnostics.
    pub name: String,
    /// Ordered list of disk-like devices.
    #[serde(default)]
    pub devices: Vec<DiskDevice>,
}

impl Guest {
    /// Returns true if at least one device has the plain disk role.
    pub fn has_disk_device(&self) -> bool {
        self.devices.iter().any(|d| d.role == DiskRole::Disk)
    }

    /// Returns the first disk-like device, in attachment order.
    pub fn first_device(&self) -> Option<&DiskDevice> {
        self.devices.first()
    }

    /// Returns true if any device carries a per-device boot-order
    /// annotation.
    pub fn has_per_device_boot_order(&self) -> bool {
        self.devices.iter().any(|d| d.boot_index.is_some())
    }
}
