//! Host detection: OS family, package manager and runtime version

use crate::templates::version::parse_major;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Operating system family, as far as installation strategies care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Debian,
    RedHat,
    MacOs,
    LinuxOther,
    Unknown,
}

impl OsFamily {
    pub fn display_name(&self) -> &'static str {
        match self {
            OsFamily::Debian => "Debian/Ubuntu",
            OsFamily::RedHat => "RedHat/Fedora",
            OsFamily::MacOs => "macOS",
            OsFamily::LinuxOther => "Linux",
            OsFamily::Unknown => "unknown OS",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// System package manager found on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Homebrew,
}

impl PackageManager {
    /// Binary name of the package manager
    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Homebrew => "brew",
        }
    }
}

/// Snapshot of detected host facts
///
/// Produced fresh by every [`Prober::probe`] call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRecord {
    pub os_family: OsFamily,
    pub runtime_present: bool,
    /// `None` when the runtime is missing or its version string is unparseable
    pub runtime_major_version: Option<u64>,
    pub package_manager: Option<PackageManager>,
    /// Raw version output, trimmed (e.g. `v18.19.0`)
    pub runtime_version: Option<String>,
    pub runtime_path: Option<PathBuf>,
}

impl CapabilityRecord {
    /// Short human description of the detected runtime
    pub fn runtime_summary(&self) -> String {
        match (&self.runtime_version, self.runtime_present) {
            (_, false) => "not installed".to_string(),
            (Some(v), true) if self.runtime_major_version.is_some() => v.clone(),
            (Some(v), true) => format!("unrecognized version '{}'", v),
            (None, true) => "unknown version".to_string(),
        }
    }
}

/// The runtime the scaffolded project needs
#[derive(Debug, Clone)]
pub struct RuntimeRequirement {
    /// Executable looked up on the search path (e.g. "node")
    pub executable: &'static str,
    /// Human-readable name (e.g. "Node.js")
    pub display_name: &'static str,
    /// Minimum major version used unless overridden on the command line
    pub default_minimum_major: u64,
}

/// Read-only view of the host, injectable for tests
pub trait HostEnv {
    /// Platform string, as in `std::env::consts::OS`
    fn platform(&self) -> &str;

    /// Read a text file; `None` if missing or unreadable
    fn read_file(&self, path: &Path) -> Option<String>;

    fn path_exists(&self, path: &Path) -> bool;

    /// Locate an executable, on `search_path` when given or the process PATH otherwise
    fn find_executable(&self, name: &str, search_path: Option<&OsString>) -> Option<PathBuf>;

    /// Run a program and return its trimmed stdout if it exited successfully
    fn command_stdout(&self, program: &Path, args: &[&str]) -> Option<String>;
}

/// The real host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostEnv for SystemHost {
    fn platform(&self) -> &str {
        std::env::consts::OS
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn find_executable(&self, name: &str, search_path: Option<&OsString>) -> Option<PathBuf> {
        match search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(name, Some(paths), cwd).ok()
            }
            None => which::which(name).ok(),
        }
    }

    fn command_stdout(&self, program: &Path, args: &[&str]) -> Option<String> {
        let output = Command::new(program).args(args).output().ok()?;
        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            None
        }
    }
}

const DEBIAN_IDS: &[&str] = &["debian", "ubuntu", "linuxmint", "pop", "raspbian"];
const REDHAT_IDS: &[&str] = &["rhel", "fedora", "centos", "rocky", "almalinux", "amzn"];
const REDHAT_MARKERS: &[&str] = &[
    "/etc/redhat-release",
    "/etc/fedora-release",
    "/etc/centos-release",
];

/// Environment prober
///
/// Never fails: anything it cannot determine is reported as
/// [`OsFamily::Unknown`] or `None`.
pub struct Prober<H: HostEnv> {
    host: H,
    runtime: RuntimeRequirement,
    search_path: Option<OsString>,
}

impl<H: HostEnv> Prober<H> {
    pub fn new(host: H, runtime: RuntimeRequirement) -> Self {
        Self {
            host,
            runtime,
            search_path: None,
        }
    }

    /// Use this search path for executable lookups instead of the process PATH
    pub fn set_search_path(&mut self, path: OsString) {
        self.search_path = Some(path);
    }

    pub fn search_path(&self) -> Option<&OsString> {
        self.search_path.as_ref()
    }

    pub fn runtime(&self) -> &RuntimeRequirement {
        &self.runtime
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn probe(&self) -> CapabilityRecord {
        let os_family = self.detect_os_family();
        let package_manager = self.detect_package_manager(os_family);

        let runtime_path = self
            .host
            .find_executable(self.runtime.executable, self.search_path.as_ref());
        let runtime_version = runtime_path
            .as_deref()
            .and_then(|path| self.host.command_stdout(path, &["--version"]))
            .map(|out| out.lines().next().unwrap_or("").trim().to_string());
        let runtime_major_version = runtime_version.as_deref().and_then(parse_major);

        CapabilityRecord {
            os_family,
            runtime_present: runtime_path.is_some(),
            runtime_major_version,
            package_manager,
            runtime_version,
            runtime_path,
        }
    }

    fn detect_os_family(&self) -> OsFamily {
        match self.host.platform() {
            "macos" => return OsFamily::MacOs,
            "linux" => {}
            _ => return OsFamily::Unknown,
        }

        if self.host.path_exists(Path::new("/etc/debian_version")) {
            return OsFamily::Debian;
        }
        if REDHAT_MARKERS
            .iter()
            .any(|marker| self.host.path_exists(Path::new(marker)))
        {
            return OsFamily::RedHat;
        }

        self.host
            .read_file(Path::new("/etc/os-release"))
            .map(|content| family_from_os_release(&content))
            .unwrap_or(OsFamily::LinuxOther)
    }

    fn detect_package_manager(&self, os_family: OsFamily) -> Option<PackageManager> {
        let candidates: &[PackageManager] = match os_family {
            OsFamily::Debian => &[PackageManager::Apt],
            OsFamily::RedHat => &[PackageManager::Dnf, PackageManager::Yum],
            OsFamily::MacOs => &[PackageManager::Homebrew],
            OsFamily::LinuxOther | OsFamily::Unknown => &[],
        };

        candidates.iter().copied().find(|pm| {
            self.host
                .find_executable(pm.program(), self.search_path.as_ref())
                .is_some()
        })
    }
}

/// Classify a Linux distribution from `/etc/os-release` content (`ID` and `ID_LIKE`)
pub fn family_from_os_release(content: &str) -> OsFamily {
    let mut ids: Vec<String> = Vec::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if matches!(key.trim(), "ID" | "ID_LIKE") {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            ids.extend(value.split_whitespace().map(|s| s.to_ascii_lowercase()));
        }
    }

    if ids.iter().any(|id| DEBIAN_IDS.contains(&id.as_str())) {
        OsFamily::Debian
    } else if ids.iter().any(|id| REDHAT_IDS.contains(&id.as_str())) {
        OsFamily::RedHat
    } else {
        OsFamily::LinuxOther
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet, VecDeque};

    /// Scriptable host; each `--version` call pops the next queued answer
    #[derive(Default)]
    pub struct FakeHost {
        pub platform: String,
        pub files: HashMap<PathBuf, String>,
        pub executables: HashSet<String>,
        /// Executables only visible on a reloaded search path
        pub reloaded_executables: HashSet<String>,
        pub versions: RefCell<VecDeque<String>>,
        pub last_version: RefCell<Option<String>>,
    }

    impl FakeHost {
        pub fn linux() -> Self {
            Self {
                platform: "linux".to_string(),
                ..Default::default()
            }
        }

        pub fn with_file(mut self, path: &str, content: &str) -> Self {
            self.files.insert(PathBuf::from(path), content.to_string());
            self
        }

        pub fn with_executable(mut self, name: &str) -> Self {
            self.executables.insert(name.to_string());
            self
        }

        pub fn with_versions(self, versions: &[&str]) -> Self {
            self.versions
                .borrow_mut()
                .extend(versions.iter().map(|v| v.to_string()));
            self
        }
    }

    impl HostEnv for FakeHost {
        fn platform(&self) -> &str {
            &self.platform
        }

        fn read_file(&self, path: &Path) -> Option<String> {
            self.files.get(path).cloned()
        }

        fn path_exists(&self, path: &Path) -> bool {
            self.files.contains_key(path)
        }

        fn find_executable(&self, name: &str, search_path: Option<&OsString>) -> Option<PathBuf> {
            let visible = self.executables.contains(name)
                || (search_path.is_some() && self.reloaded_executables.contains(name));
            visible.then(|| PathBuf::from("/usr/bin").join(name))
        }

        fn command_stdout(&self, _program: &Path, _args: &[&str]) -> Option<String> {
            let mut last = self.last_version.borrow_mut();
            if let Some(next) = self.versions.borrow_mut().pop_front() {
                *last = Some(next);
            }
            last.clone()
        }
    }

    pub fn node() -> RuntimeRequirement {
        RuntimeRequirement {
            executable: "node",
            display_name: "Node.js",
            default_minimum_major: 18,
        }
    }

    #[test]
    fn test_debian_marker_wins() {
        let host = FakeHost::linux()
            .with_file("/etc/debian_version", "12.4")
            .with_executable("apt-get");
        let record = Prober::new(host, node()).probe();

        assert_eq!(record.os_family, OsFamily::Debian);
        assert_eq!(record.package_manager, Some(PackageManager::Apt));
        assert!(!record.runtime_present);
        assert_eq!(record.runtime_major_version, None);
    }

    #[test]
    fn test_redhat_prefers_dnf_over_yum() {
        let host = FakeHost::linux()
            .with_file("/etc/fedora-release", "Fedora release 39")
            .with_executable("dnf")
            .with_executable("yum");
        let record = Prober::new(host, node()).probe();

        assert_eq!(record.os_family, OsFamily::RedHat);
        assert_eq!(record.package_manager, Some(PackageManager::Dnf));
    }

    #[test]
    fn test_os_release_fallback() {
        let host = FakeHost::linux().with_file(
            "/etc/os-release",
            "NAME=\"Rocky Linux\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\n",
        );
        assert_eq!(Prober::new(host, node()).probe().os_family, OsFamily::RedHat);

        let host = FakeHost::linux().with_file("/etc/os-release", "ID=arch\n");
        assert_eq!(
            Prober::new(host, node()).probe().os_family,
            OsFamily::LinuxOther
        );
    }

    #[test]
    fn test_unknown_platform() {
        let host = FakeHost {
            platform: "freebsd".to_string(),
            ..Default::default()
        }
        .with_executable("node")
        .with_versions(&["v20.11.1"]);
        let record = Prober::new(host, node()).probe();

        assert_eq!(record.os_family, OsFamily::Unknown);
        assert_eq!(record.package_manager, None);
        assert_eq!(record.runtime_major_version, Some(20));
    }

    #[test]
    fn test_macos_without_brew() {
        let host = FakeHost {
            platform: "macos".to_string(),
            ..Default::default()
        };
        let record = Prober::new(host, node()).probe();

        assert_eq!(record.os_family, OsFamily::MacOs);
        assert_eq!(record.package_manager, None);
    }

    #[test]
    fn test_garbage_version_is_present_but_unknown() {
        let host = FakeHost::linux()
            .with_executable("node")
            .with_versions(&["not a version"]);
        let record = Prober::new(host, node()).probe();

        assert!(record.runtime_present);
        assert_eq!(record.runtime_major_version, None);
        assert!(record.runtime_summary().contains("unrecognized"));
    }

    #[test]
    fn test_family_from_os_release_ubuntu() {
        let content = "ID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"22.04\"\n";
        assert_eq!(family_from_os_release(content), OsFamily::Debian);
    }
}
