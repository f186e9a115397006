use clap::error::ErrorKind;
use std::fmt::Display;

mod package;
pub use package::PackageValueParser;

mod timeout;
pub use timeout::TimeoutValueParser;

pub fn simple_error(err: impl Display) -> clap::Error {
    clap::Error::raw(ErrorKind::InvalidValue, format!("{}\n", err))
}
