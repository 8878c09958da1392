//! Version and build information
//!
//! Values are embedded by build.rs at compile time.

use std::fmt;

/// Build information embedded at compile time
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    /// Short git commit hash, "unknown" outside a checkout
    pub git_hash: &'static str,
    git_dirty: &'static str,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("TASKRUNNER_GIT_HASH"),
            git_dirty: env!("TASKRUNNER_GIT_DIRTY"),
            build_timestamp: env!("TASKRUNNER_BUILD_TIMESTAMP"),
            target: env!("TASKRUNNER_TARGET"),
            profile: env!("TASKRUNNER_PROFILE"),
        }
    }

    /// Whether the working directory had local changes at build time
    pub fn git_dirty(&self) -> bool {
        self.git_dirty == "true"
    }

    /// Version with revision, e.g. "0.1.0-abc1234"
    pub fn full_version(&self) -> String {
        if self.git_dirty() {
            format!("{}-{}-dirty", self.version, self.git_hash)
        } else {
            format!("{}-{}", self.version, self.git_hash)
        }
    }

    /// Value of the User-Agent header sent to the server
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.full_version())
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f, "  Built:   {}", self.build_timestamp)?;
        writeln!(f, "  Target:  {}", self.target)?;
        writeln!(f, "  Profile: {}", self.profile)
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}
