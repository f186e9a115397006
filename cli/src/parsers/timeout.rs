use std::time::Duration;

use clap::builder::TypedValueParser;

use crate::parsers::simple_error;

/// Parses a per command timeout given in whole seconds. `0` parses to a zero
/// duration, which callers treat as no timeout.
#[derive(Clone)]
pub struct TimeoutValueParser;

impl TypedValueParser for TimeoutValueParser {
    type Value = Duration;

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let raw = value
            .to_str()
            .ok_or_else(|| simple_error("timeout must be valid UTF-8"))?;
        let secs = raw
            .trim()
            .parse::<u64>()
            .map_err(|e| simple_error(format!("invalid timeout {:?}: {}", raw, e)))?;
        Ok(Duration::from_secs(secs))
    }
}
