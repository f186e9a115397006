use std::io::Write;
use std::path::PathBuf;

use anyhow::Context as AnyhowContext;
use clap::{self, Args};

use droidscan::export::{from_json_file, write_csv};

use crate::utils::open_output;

/// Convert a JSON report from `scan --format json` to CSV
#[derive(Args)]
pub struct Export {
    /// The JSON report
    report: PathBuf,

    /// Write the CSV here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl Export {
    pub fn run(&self) -> anyhow::Result<()> {
        let report = from_json_file(&self.report)
            .with_context(|| format!("reading report {}", self.report.display()))?;
        let mut out = open_output(self.out.as_deref())?;
        write_csv(&report, &mut out)?;
        out.flush()?;
        Ok(())
    }
}
