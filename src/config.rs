//! YAML profile loading and validation.
//!
//! A profile describes one install attempt declaratively: the target
//! guest's disk-like devices, the scratch directory for staged media, and
//! the install method with its parameters. The `method` field selects the
//! strategy variant.
//!
//! ```yaml
//! scratch_dir: /var/tmp/virtstage
//! guest:
//!   name: web01
//!   devices:
//!     - path: /var/lib/images/web01.qcow2
//!       role: disk
//! install:
//!   method: pxe
//!   location: http://mirror.example.com/fedora/releases/40/Server/x86_64/os/
//!   kernel: /var/tmp/virtstage/vmlinuz
//!   initrd: /var/tmp/virtstage/initrd.img
//!   extra_args: console=ttyS0
//!   initrd_inject:
//!     - path: /etc/ks/web01.cfg
//!       name: ks.cfg
//! ```

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::VirtstageError;
use crate::guest::Guest;
use crate::installer::{InstallMethod, Installer};
use crate::media::Injection;

/// Top-level install profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Working directory for staged media and temporary files.
    pub scratch_dir: Utf8PathBuf,
    /// Read view of the target guest.
    pub guest: Guest,
    /// Install method and parameters.
    pub install: InstallConfig,
}

/// Install section of the profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstallConfig {
    /// Strategy variant plus variant-specific fields.
    #[serde(flatten)]
    pub method: MethodConfig,
    /// Install source: URL for pxe, media path for livecd.
    #[serde(default)]
    pub location: Option<String>,
    /// Attach generated install media as a CD-ROM device.
    #[serde(default)]
    pub cdrom: bool,
    /// Extra string appended to kernel boot arguments at install time.
    #[serde(default)]
    pub extra_args: Option<String>,
    /// Files injected into generated boot media.
    #[serde(default)]
    pub initrd_inject: Vec<Injection>,
}

/// Install method configuration.
///
/// The `method` field in YAML determines which variant is used.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum MethodConfig {
    /// Container guest, boots straight from its root filesystem.
    Container,
    /// Network/PXE install with caller-resolved kernel and initrd.
    Pxe {
        #[serde(default)]
        kernel: Option<Utf8PathBuf>,
        #[serde(default)]
        initrd: Option<Utf8PathBuf>,
    },
    /// Live CD boot from existing media.
    Livecd,
    /// Import of an existing disk image.
    Import,
}

impl MethodConfig {
    /// Whether this method requires an install location.
    fn requires_location(&self) -> bool {
        matches!(self, MethodConfig::Pxe { .. } | MethodConfig::Livecd)
    }
}

impl InstallConfig {
    /// Builds a validated [`Installer`] from this configuration.
    ///
    /// Location validation runs through the strategy's hook, so an
    /// unusable location fails here rather than during staging.
    pub fn to_installer(&self) -> Result<Installer, VirtstageError> {
        let method = match &self.method {
            MethodConfig::Container => InstallMethod::Container,
            MethodConfig::Pxe { kernel, initrd } => InstallMethod::Pxe {
                kernel: kernel.clone(),
                initrd: initrd.clone(),
            },
            MethodConfig::Livecd => InstallMethod::LiveCd,
            MethodConfig::Import => InstallMethod::Import,
        };

        let mut installer = Installer::new(method);
        installer.cdrom = self.cdrom;
        installer.extra_args = self.extra_args.clone();
        installer.initrd_injections = self.initrd_inject.clone();

        match &self.location {
            Some(location) => installer.set_location(location)?,
            None if self.method.requires_location() => {
                return Err(VirtstageError::Validation(format!(
                    "the {} install method requires a location",
                    match &self.method {
                        MethodConfig::Pxe { .. } => "pxe",
                        _ => "livecd",
                    }
                )));
            }
            None => {}
        }

        Ok(installer)
    }
}

impl Profile {
    /// Validates the profile beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), VirtstageError> {
        if self.scratch_dir.as_str().is_empty() {
            return Err(VirtstageError::Validation(
                "scratch_dir must not be empty".to_string(),
            ));
        }
        if self.guest.name.is_empty() {
            return Err(VirtstageError::Validation(
                "guest name must not be empty".to_string(),
            ));
        }
        for device in &self.guest.devices {
            if device.path.as_str().is_empty() {
                return Err(VirtstageError::Validation(
                    "guest device path must not be empty".to_string(),
                ));
            }
        }
        for injection in &self.install.initrd_inject {
            // Destination-name derivation fails fast on sources like "/".
            injection.destination_name()?;
        }
        self.install.to_installer()?;
        Ok(())
    }
}

/// Loads a profile from a YAML file.
pub fn load_profile(path: &Utf8Path) -> Result<Profile> {
    let file = File::open(path).with_context(|| format!("failed to load file: {}", path))?;
    let reader = BufReader::new(file);
    let profile: Profile = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse yaml: {}", path))?;
    Ok(profile)
}
