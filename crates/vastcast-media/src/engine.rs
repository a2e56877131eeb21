//! FFmpeg discovery.
//!
//! The encoder is located once at startup and the resulting
//! [`EngineLocation`] is shared read-only for the life of the process.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

const ENGINE_BINARY: &str = "ffmpeg";
const HOMEBREW_ENGINE: &str = "/opt/homebrew/bin/ffmpeg";

/// Environment variables whose presence marks a serverless host.
const SERVERLESS_MARKERS: &[&str] = &["VERCEL", "NOW_REGION"];

/// How the encoder path was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineSource {
    /// Explicitly configured path
    Configured,
    /// Binary shipped next to the executable or in the working directory
    Bundled,
    /// Homebrew install location
    Homebrew,
    /// Found on `PATH`
    SystemPath,
    /// Nothing found; the bare name is used and resolved at spawn time
    Fallback,
}

impl EngineSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineSource::Configured => "configured",
            EngineSource::Bundled => "bundled",
            EngineSource::Homebrew => "homebrew",
            EngineSource::SystemPath => "system_path",
            EngineSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EngineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where to look for the encoder.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryContext {
    /// Explicit path, used as-is when set
    pub explicit: Option<PathBuf>,
    /// Directories that may hold a bundled binary, in priority order
    pub bundled_dirs: Vec<PathBuf>,
    /// Homebrew path to probe
    pub homebrew: Option<PathBuf>,
    /// Whether to search `PATH`
    pub search_path: bool,
}

impl DiscoveryContext {
    /// Build the context from the running process.
    ///
    /// The Homebrew location is skipped on serverless hosts.
    pub fn from_process(explicit: Option<PathBuf>) -> Self {
        let mut bundled_dirs = Vec::new();
        if let Some(dir) = env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            bundled_dirs.push(dir);
        }
        if let Ok(cwd) = env::current_dir() {
            if !bundled_dirs.contains(&cwd) {
                bundled_dirs.push(cwd);
            }
        }

        let serverless = SERVERLESS_MARKERS.iter().any(|var| env::var_os(var).is_some());

        Self {
            explicit,
            bundled_dirs,
            homebrew: (!serverless).then(|| PathBuf::from(HOMEBREW_ENGINE)),
            search_path: true,
        }
    }
}

/// Resolved encoder location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineLocation {
    program: PathBuf,
    source: EngineSource,
}

impl EngineLocation {
    /// Locate the encoder for this process.
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        Self::discover_with(&DiscoveryContext::from_process(explicit))
    }

    /// Locate the encoder using an explicit search context.
    pub fn discover_with(ctx: &DiscoveryContext) -> Self {
        let location = Self::search(ctx);
        match location.source {
            EngineSource::Fallback => warn!(
                program = %location.program.display(),
                "FFmpeg not found, falling back to bare command name"
            ),
            source => info!(
                program = %location.program.display(),
                source = %source,
                "Located FFmpeg"
            ),
        }
        location
    }

    fn search(ctx: &DiscoveryContext) -> Self {
        if let Some(path) = &ctx.explicit {
            return Self::at(path.clone());
        }

        for dir in &ctx.bundled_dirs {
            let candidate = dir.join(ENGINE_BINARY);
            if candidate.is_file() {
                ensure_executable(&candidate);
                if is_executable(&candidate) {
                    return Self {
                        program: candidate,
                        source: EngineSource::Bundled,
                    };
                }
            }
        }

        if let Some(path) = &ctx.homebrew {
            if is_executable(path) {
                return Self {
                    program: path.clone(),
                    source: EngineSource::Homebrew,
                };
            }
        }

        if ctx.search_path {
            if let Ok(path) = which::which(ENGINE_BINARY) {
                return Self {
                    program: path,
                    source: EngineSource::SystemPath,
                };
            }
        }

        Self {
            program: PathBuf::from(ENGINE_BINARY),
            source: EngineSource::Fallback,
        }
    }

    /// Use a specific path without probing.
    pub fn at(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            source: EngineSource::Configured,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn source(&self) -> EngineSource {
        self.source
    }

    /// Check that the program can currently be spawned.
    pub fn is_available(&self) -> bool {
        if self.program.components().count() > 1 {
            is_executable(&self.program)
        } else {
            which::which(&self.program).is_ok()
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Bundled binaries can lose their execute bit when unpacked.
#[cfg(unix)]
fn ensure_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if is_executable(path) {
        return;
    }
    match std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)) {
        Ok(()) => debug!(path = %path.display(), "Marked bundled FFmpeg executable"),
        Err(e) => warn!(path = %path.display(), error = %e, "Could not mark bundled FFmpeg executable"),
    }
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) {}
