use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Per-OS knowledge of where the node keeps its configuration.
pub trait Platform {
    fn name(&self) -> &'static str;

    /// Locations checked in order.
    fn config_candidates(&self) -> Vec<PathBuf>;

    /// Used when none of the candidates exist yet.
    fn default_config_path(&self) -> PathBuf;

    fn find_config_path(&self) -> PathBuf {
        match self.config_candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => path,
            None => {
                let fallback = self.default_config_path();
                debug!(
                    "No existing config on {}, using {}",
                    self.name(),
                    fallback.display()
                );
                fallback
            }
        }
    }
}

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

pub struct Linux;

impl Platform for Linux {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        paths(&["/etc/yggdrasil.conf", "/etc/yggdrasil/yggdrasil.conf"])
    }

    fn default_config_path(&self) -> PathBuf {
        PathBuf::from("/etc/yggdrasil.conf")
    }
}

pub struct Darwin;

impl Platform for Darwin {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        paths(&[
            "/etc/yggdrasil.conf",
            "/usr/local/etc/yggdrasil.conf",
            "/opt/homebrew/etc/yggdrasil.conf",
        ])
    }

    fn default_config_path(&self) -> PathBuf {
        PathBuf::from("/etc/yggdrasil.conf")
    }
}

pub struct FreeBsd;

impl Platform for FreeBsd {
    fn name(&self) -> &'static str {
        "freebsd"
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        paths(&["/usr/local/etc/yggdrasil.conf", "/etc/yggdrasil.conf"])
    }

    fn default_config_path(&self) -> PathBuf {
        PathBuf::from("/usr/local/etc/yggdrasil.conf")
    }
}

pub struct OpenBsd;

impl Platform for OpenBsd {
    fn name(&self) -> &'static str {
        "openbsd"
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        paths(&["/etc/yggdrasil.conf", "/usr/local/etc/yggdrasil.conf"])
    }

    fn default_config_path(&self) -> PathBuf {
        PathBuf::from("/etc/yggdrasil.conf")
    }
}

pub struct NetBsd;

impl Platform for NetBsd {
    fn name(&self) -> &'static str {
        "netbsd"
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        paths(&["/etc/yggdrasil.conf", "/usr/pkg/etc/yggdrasil.conf"])
    }

    fn default_config_path(&self) -> PathBuf {
        PathBuf::from("/etc/yggdrasil.conf")
    }
}

pub struct Windows;

impl Platform for Windows {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        vec![self.default_config_path()]
    }

    fn default_config_path(&self) -> PathBuf {
        let program_data = env::var_os("PROGRAMDATA")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"));
        program_data.join("Yggdrasil").join("yggdrasil.conf")
    }
}

/// The platform this binary was built for.
pub fn current() -> Box<dyn Platform> {
    if cfg!(target_os = "windows") {
        Box::new(Windows)
    } else if cfg!(target_os = "macos") {
        Box::new(Darwin)
    } else if cfg!(target_os = "freebsd") {
        Box::new(FreeBsd)
    } else if cfg!(target_os = "openbsd") {
        Box::new(OpenBsd)
    } else if cfg!(target_os = "netbsd") {
        Box::new(NetBsd)
    } else {
        Box::new(Linux)
    }
}
