//! Application layer - Use cases that coordinate domain services.
//!
//! Each use case borrows the store, the installed-state repository and the
//! executor it needs; the CLI layer builds them from a [`crate::config::Config`].

mod info;
mod install;
mod list;
mod livecheck;
mod uninstall;

pub use info::{InfoUseCase, PackageInfo};
pub use install::{InstallOptions, InstallOutcome, InstallUseCase};
pub use list::ListUseCase;
pub use livecheck::{LivecheckReport, LivecheckUseCase};
pub use uninstall::UninstallUseCase;
