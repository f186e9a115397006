use clap::builder::{NonEmptyStringValueParser, TypedValueParser};

use crate::parsers::simple_error;
use droidscan::markers::is_valid_package_name;

/// Only lets through values that look like Android package names
#[derive(Clone)]
pub struct PackageValueParser;

impl TypedValueParser for PackageValueParser {
    type Value = String;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let parser = NonEmptyStringValueParser::new();
        let val = parser.parse_ref(cmd, arg, value)?;
        if !is_valid_package_name(&val) {
            return Err(simple_error(format!("{:?} is not a valid package name", val)));
        }
        Ok(val)
    }
}
