//! Build metadata injected by `build.rs`

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BUILD_NUMBER: &str = env!("RELAY_BUILD_NUMBER");
pub const GIT_COMMIT: &str = env!("RELAY_GIT_COMMIT");
pub const BUILD_TIMESTAMP: &str = env!("RELAY_BUILD_TIMESTAMP");

/// Version metadata as a struct
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub build_number: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
}

impl VersionInfo {
    pub fn get() -> Self {
        Self {
            version: VERSION,
            build_number: BUILD_NUMBER,
            git_commit: GIT_COMMIT,
            build_timestamp: BUILD_TIMESTAMP,
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "relay v{} (build {}, commit {}, built {})",
            self.version, self.build_number, self.git_commit, self.build_timestamp
        )
    }
}
