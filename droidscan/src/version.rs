use std::fmt::Display;

/// Version of the scanner library, embedded at build time
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Version {
    pub major: usize,
    pub minor: usize,
    pub patch: usize,
    pub extra: Option<&'static str>,
}

include!(concat!(env!("OUT_DIR"), "/current_version.rs"));

impl Default for Version {
    fn default() -> Self {
        VERSION
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.extra {
            Some(s) => write!(f, "{}.{}.{}-{}", self.major, self.minor, self.patch, s),
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}
