//! Boot-configuration builder.
//!
//! Computes the ordered boot-device sequence and install-time kernel
//! parameters for a guest, from the installer's per-phase decisions plus
//! the guest's device list. This is a pure transformation over validated
//! in-memory state; it performs no I/O and cannot fail.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::guest::Guest;
use crate::installer::Installer;

/// Symbolic tag for a class of bootable device, independent of the
/// concrete device instance. Serialized with the hypervisor schema's
/// short tags (`network`, `hd`, `cdrom`, `fd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BootDevice {
    /// PXE/network boot
    Network,
    /// Hard disk
    #[serde(rename = "hd")]
    #[strum(serialize = "hd")]
    HardDisk,
    /// CD-ROM drive
    Cdrom,
    /// Floppy drive
    #[serde(rename = "fd")]
    #[strum(serialize = "fd")]
    Floppy,
}

/// Mutable view into the boot-related fields of the guest's configuration
/// document. Only the fields the installer is authorized to write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Global ordered boot-device sequence.
    ///
    /// Mutually exclusive with per-device boot-order annotations on the
    /// guest's devices; left unset when any device carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootorder: Option<Vec<BootDevice>>,
    /// Direct-boot kernel path (install phase only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<Utf8PathBuf>,
    /// Direct-boot initrd path (install phase only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initrd: Option<Utf8PathBuf>,
    /// Kernel command-line arguments (install phase only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_args: Option<String>,
}

/// Applies the installer's boot decisions for the requested phase to the
/// boot-config view.
///
/// - A request for the install phase on a variant without one is a no-op.
/// - The phase's boot device leads the sequence; `hd` is appended once
///   when the guest has any plain disk device, so local disks stay
///   selectable behind a network or CD-ROM primary (guest-side
///   bootloaders and post-PXE fallback rely on this).
/// - The global `bootorder` is written only when no device carries its
///   own boot-order annotation and the caller has not set one already.
/// - Kernel, initrd, and kernel arguments apply only during install.
pub fn alter_boot_config(
    installer: &Installer,
    guest: &Guest,
    install_phase: bool,
    boot: &mut BootConfig,
) {
    if install_phase && !installer.has_install_phase() {
        return;
    }

    let mut sequence = vec![installer.boot_device_for_phase(guest, install_phase)];
    if guest.has_disk_device() && !sequence.contains(&BootDevice::HardDisk) {
        sequence.push(BootDevice::HardDisk);
    }

    if !guest.has_per_device_boot_order() && boot.bootorder.is_none() {
        boot.bootorder = Some(sequence);
    }

    if !install_phase {
        return;
    }

    if let Some(kernel) = installer.install_kernel() {
        boot.kernel = Some(kernel.to_owned());
    }
    if let Some(initrd) = installer.install_initrd() {
        boot.initrd = Some(initrd.to_owned());
    }
    if let Some(args) = installer.extra_args() {
        boot.kernel_args = Some(args.to_owned());
    }
}
