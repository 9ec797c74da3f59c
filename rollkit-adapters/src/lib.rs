pub mod git;
pub mod lockfile;
pub mod npm;
pub mod process;

pub use git::{GitRepository, GitVersionControl};
pub use lockfile::NpmLockfile;
pub use npm::NpmRegistry;
pub use process::SystemProcess;
