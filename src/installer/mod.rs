//! Installer strategies and the ephemeral install state they own.
//!
//! An [`Installer`] pairs one closed [`InstallMethod`] variant with the
//! install parameters and ephemeral resources of a single install
//! attempt. The variant decides which boot device leads at install time
//! and after install, whether an install phase exists at all, and what
//! staging `prepare()` performs. Ephemeral collections (`install_devices`,
//! `tmp_files`, `tmp_volumes`) are populated only between a `prepare()`
//! call and the next `cleanup()`; `prepare()` always begins with a
//! `cleanup()` so repeated installs from one instance never leak.

pub mod detect;

use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::bootconfig::BootDevice;
use crate::error::{VirtstageError, io_error_kind_message};
use crate::executor::CommandExecutor;
use crate::guest::{DiskRole, Guest};
use crate::media::{self, Injection};

/// Timeout for the best-effort network reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// URL schemes accepted as network install sources.
const NETWORK_SCHEMES: &[&str] = &["http", "https", "ftp", "tftp"];

/// A validated install source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Network source for PXE-style installs.
    Url(Url),
    /// Local path: live media image or host device node.
    Path(Utf8PathBuf),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Url(url) => write!(f, "{}", url),
            Location::Path(path) => write!(f, "{}", path),
        }
    }
}

/// An ephemeral device descriptor attached to the guest for the install
/// phase only (e.g., an install-only CD-ROM wrapping a generated ISO).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InstallDevice {
    /// Device role the guest sees.
    pub role: DiskRole,
    /// Backing path on the host.
    pub path: Utf8PathBuf,
}

/// Closed set of install-source strategies.
///
/// Formerly open-ended subclassing territory; a closed enum keeps the
/// capability table exhaustive and match-checkable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMethod {
    /// Container guest: no install phase, boots from its root filesystem.
    Container,
    /// Network/PXE install. Kernel/initrd fetching is the caller's
    /// concern; already-resolved paths are adopted during `prepare()`.
    Pxe {
        kernel: Option<Utf8PathBuf>,
        initrd: Option<Utf8PathBuf>,
    },
    /// Live CD: the medium at the install location is the boot medium.
    LiveCd,
    /// Import of an existing disk: boot from whatever the first device is.
    Import,
}

impl InstallMethod {
    /// Short strategy name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            InstallMethod::Container => "container",
            InstallMethod::Pxe { .. } => "pxe",
            InstallMethod::LiveCd => "livecd",
            InstallMethod::Import => "import",
        }
    }
}

/// One install attempt: a strategy variant plus the install parameters
/// and ephemeral resources it owns.
#[derive(Debug)]
pub struct Installer {
    method: InstallMethod,
    location: Option<Location>,
    /// Whether install media should be attached as a CD-ROM device.
    pub cdrom: bool,
    /// Extra string appended to kernel boot arguments at install time.
    pub extra_args: Option<String>,
    /// Files to inject into generated boot media.
    pub initrd_injections: Vec<Injection>,
    install_kernel: Option<Utf8PathBuf>,
    install_initrd: Option<Utf8PathBuf>,
    install_devices: Vec<InstallDevice>,
    tmp_files: Vec<Utf8PathBuf>,
    tmp_volumes: Vec<Utf8PathBuf>,
}

impl Installer {
    /// Creates an installer for the given strategy with no parameters set.
    pub fn new(method: InstallMethod) -> Self {
        Self {
            method,
            location: None,
            cdrom: false,
            extra_args: None,
            initrd_injections: Vec::new(),
            install_kernel: None,
            install_initrd: None,
            install_devices: Vec::new(),
            tmp_files: Vec::new(),
            tmp_volumes: Vec::new(),
        }
    }

    /// Returns the strategy variant.
    pub fn method(&self) -> &InstallMethod {
        &self.method
    }

    /// Returns the validated install location, if one was set.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Returns the staged kernel path, if any.
    pub fn install_kernel(&self) -> Option<&Utf8Path> {
        self.install_kernel.as_deref()
    }

    /// Returns the staged initrd path, if any.
    pub fn install_initrd(&self) -> Option<&Utf8Path> {
        self.install_initrd.as_deref()
    }

    /// Returns the extra kernel arguments, if set.
    pub fn extra_args(&self) -> Option<&str> {
        self.extra_args.as_deref()
    }

    /// Ephemeral install-only devices staged by the last `prepare()`.
    pub fn install_devices(&self) -> &[InstallDevice] {
        &self.install_devices
    }

    /// Temporary files owned until the next `cleanup()`.
    pub fn tmp_files(&self) -> &[Utf8PathBuf] {
        &self.tmp_files
    }

    /// Temporary volume backing files owned until the next `cleanup()`.
    pub fn tmp_volumes(&self) -> &[Utf8PathBuf] {
        &self.tmp_volumes
    }

    /// Hands ownership of a caller-staged volume backing file to this
    /// installer. It is deleted by the next `cleanup()` like any other
    /// ephemeral resource.
    pub fn register_tmp_volume(&mut self, path: impl Into<Utf8PathBuf>) {
        self.tmp_volumes.push(path.into());
    }

    /// Validates and stores the install location through the variant's
    /// hook. The validated value replaces any prior value atomically; on
    /// error the previous location is kept.
    pub fn set_location(&mut self, raw: &str) -> Result<(), VirtstageError> {
        let validated = match &self.method {
            InstallMethod::Pxe { .. } => {
                let url = Url::parse(raw).map_err(|e| {
                    VirtstageError::Validation(format!("invalid install URL '{}': {}", raw, e))
                })?;
                if !NETWORK_SCHEMES.contains(&url.scheme()) {
                    return Err(VirtstageError::Validation(format!(
                        "unsupported install URL scheme '{}' (expected one of: {})",
                        url.scheme(),
                        NETWORK_SCHEMES.join(", ")
                    )));
                }
                Location::Url(url)
            }
            InstallMethod::LiveCd => {
                let path = Utf8PathBuf::from(raw);
                let metadata = fs::metadata(&path).map_err(|e| {
                    VirtstageError::Validation(format!(
                        "live media location '{}' is not readable: {}",
                        path,
                        io_error_kind_message(&e)
                    ))
                })?;
                if metadata.is_dir() {
                    return Err(VirtstageError::Validation(format!(
                        "live media location '{}' is a directory, expected an image or device",
                        path
                    )));
                }
                Location::Path(path)
            }
            InstallMethod::Container | InstallMethod::Import => {
                return Err(VirtstageError::Validation(format!(
                    "the {} install method does not take an install location",
                    self.method.name()
                )));
            }
        };
        self.location = Some(validated);
        Ok(())
    }

    /// Whether this strategy has a distinct install phase at all.
    ///
    /// Callers use this to decide whether install-time boot configuration
    /// applies and whether to present an "installing" state.
    pub fn has_install_phase(&self) -> bool {
        matches!(self.method, InstallMethod::Pxe { .. })
    }

    /// The single boot device this strategy leads with for the requested
    /// phase.
    pub fn boot_device_for_phase(&self, guest: &Guest, install_phase: bool) -> BootDevice {
        match &self.method {
            InstallMethod::Container => BootDevice::HardDisk,
            InstallMethod::Pxe { .. } => {
                if install_phase {
                    BootDevice::Network
                } else if guest.has_disk_device() {
                    BootDevice::HardDisk
                } else {
                    BootDevice::Network
                }
            }
            // The live medium stays the boot medium after install.
            InstallMethod::LiveCd => BootDevice::Cdrom,
            InstallMethod::Import => match guest.first_device().map(|d| d.role) {
                Some(DiskRole::Cdrom) => BootDevice::Cdrom,
                Some(DiskRole::Floppy) => BootDevice::Floppy,
                Some(DiskRole::Disk) | None => BootDevice::HardDisk,
            },
        }
    }

    /// Stages ephemeral install devices and media.
    ///
    /// Always starts from a clean slate via `cleanup()`. If staging fails
    /// partway through, everything accumulated so far is released before
    /// the error propagates, so the ephemeral collections are never left
    /// partially populated.
    pub fn prepare(
        &mut self,
        executor: &dyn CommandExecutor,
        scratch_dir: &Utf8Path,
    ) -> Result<()> {
        self.cleanup()?;
        debug!("preparing {} install", self.method.name());

        let staged = self.stage(executor, scratch_dir);
        if staged.is_err()
            && let Err(cleanup_err) = self.cleanup()
        {
            warn!("cleanup after failed prepare also failed: {}", cleanup_err);
        }
        staged
    }

    fn stage(&mut self, executor: &dyn CommandExecutor, scratch_dir: &Utf8Path) -> Result<()> {
        match self.method.clone() {
            InstallMethod::Container | InstallMethod::Import => Ok(()),
            InstallMethod::LiveCd => {
                let Some(Location::Path(path)) = self.location.clone() else {
                    return Err(VirtstageError::Validation(
                        "livecd install requires a location".to_string(),
                    )
                    .into());
                };
                // The location was validated on assignment, but the medium
                // may have vanished since; fail here rather than at boot.
                fs::metadata(&path).map_err(|e| {
                    VirtstageError::Validation(format!(
                        "live media location '{}' is no longer readable: {}",
                        path,
                        io_error_kind_message(&e)
                    ))
                })?;
                self.install_devices.push(InstallDevice {
                    role: DiskRole::Cdrom,
                    path,
                });
                Ok(())
            }
            InstallMethod::Pxe { kernel, initrd } => {
                self.install_kernel = kernel;

                if self.initrd_injections.is_empty() {
                    self.install_initrd = initrd;
                    return Ok(());
                }

                if self.cdrom {
                    let iso = media::inject_into_new_iso(
                        &self.initrd_injections,
                        scratch_dir,
                        executor,
                    )?;
                    self.tmp_files.push(iso.clone());
                    self.install_devices.push(InstallDevice {
                        role: DiskRole::Cdrom,
                        path: iso,
                    });
                    self.install_initrd = initrd;
                    return Ok(());
                }

                let Some(initrd_src) = initrd else {
                    return Err(VirtstageError::Validation(
                        "initrd injections require an initrd path or `cdrom: true`".to_string(),
                    )
                    .into());
                };
                // Inject into a scratch copy so the caller's initrd is
                // never mutated.
                let copy = scratch_dir.join(format!("initrd-{}.img", Uuid::new_v4()));
                fs::copy(&initrd_src, &copy).map_err(|e| {
                    VirtstageError::io(format!("failed to copy initrd: {}", initrd_src), e)
                })?;
                self.tmp_files.push(copy.clone());
                media::inject_into_initrd(&copy, &self.initrd_injections, scratch_dir, executor)?;
                self.install_initrd = Some(copy);
                Ok(())
            }
        }
    }

    /// Removes every staged temporary file and volume, then clears the
    /// ephemeral collections. Missing files count as already removed;
    /// anything else (permission denied, busy) is collected into one
    /// aggregated report. Idempotent, and a no-op when nothing was staged.
    pub fn cleanup(&mut self) -> Result<(), VirtstageError> {
        let mut failures = Vec::new();
        for path in self.tmp_files.iter().chain(self.tmp_volumes.iter()) {
            match fs::remove_file(path) {
                Ok(()) => debug!("removed {}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{}: {}", path, io_error_kind_message(&e))),
            }
        }

        self.install_devices.clear();
        self.tmp_files.clear();
        self.tmp_volumes.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(VirtstageError::Cleanup(failures.join("; ")))
        }
    }

    /// Best-effort reachability check for the install location.
    ///
    /// Side-effect-free: probes a TCP connect for network URLs and
    /// readability for paths. Callers should run this before a
    /// potentially slow `prepare()`.
    pub fn check_location(&self) -> Result<(), VirtstageError> {
        match &self.location {
            None => Ok(()),
            Some(Location::Path(path)) => {
                fs::metadata(path).map_err(|e| {
                    VirtstageError::Validation(format!(
                        "install location '{}' is not readable: {}",
                        path,
                        io_error_kind_message(&e)
                    ))
                })?;
                Ok(())
            }
            Some(Location::Url(url)) => {
                // tftp is UDP; a connect probe proves nothing there.
                if url.scheme() == "tftp" {
                    return Ok(());
                }
                let host = url.host_str().ok_or_else(|| {
                    VirtstageError::Validation(format!("install URL '{}' has no host", url))
                })?;
                let port = url.port_or_known_default().ok_or_else(|| {
                    VirtstageError::Validation(format!("install URL '{}' has no port", url))
                })?;
                let addr = (host, port)
                    .to_socket_addrs()
                    .map_err(|e| {
                        VirtstageError::Validation(format!(
                            "install host '{}' did not resolve: {}",
                            host, e
                        ))
                    })?
                    .next()
                    .ok_or_else(|| {
                        VirtstageError::Validation(format!(
                            "install host '{}' resolved to no addresses",
                            host
                        ))
                    })?;
                TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).map_err(|e| {
                    VirtstageError::Validation(format!(
                        "install location '{}' is unreachable: {}",
                        url, e
                    ))
                })?;
                info!("install location {} is reachable", url);
                Ok(())
            }
        }
    }

    /// Best-effort guess of the source distro family and version from the
    /// install location. `(None, None)` when detection does not apply to
    /// this variant or nothing is recognized.
    pub fn detect_distro(&self) -> (Option<String>, Option<String>) {
        match (&self.method, &self.location) {
            (InstallMethod::Pxe { .. } | InstallMethod::LiveCd, Some(location)) => {
                detect::detect_from_location(&location.to_string())
            }
            _ => (None, None),
        }
    }
}
