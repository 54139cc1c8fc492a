//! CLI commands: build use cases from a [`Config`] and print their results.

mod info;
mod install;
mod list;
mod livecheck;
mod uninstall;

pub use info::info;
pub use install::install;
pub use list::list;
pub use livecheck::livecheck;
pub use uninstall::uninstall;

use crate::config::Config;
use crate::executor::{Executor, HttpFetcher};
use crate::runtime::Runtime;

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn executor<'a, R: Runtime>(
    config: &'a Config<R>,
    fetcher: &'a HttpFetcher<'a, R>,
) -> Executor<'a, R, HttpFetcher<'a, R>> {
    Executor::new(&config.runtime, fetcher, &config.layout)
}
