//! Tabular and JSON renderings of a [ScanReport]

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::model::{PackageRecord, ScanReport, Status};
use crate::utils::open_file;

/// Written in the permissions column when a package has none
pub const NO_PERMISSIONS: &str = "None";

pub const CSV_HEADERS: [&str; 4] = ["Package", "Installer", "Status", "Dangerous Permissions"];

const PERMISSION_SEPARATOR: char = ',';

/// Write the report's apps as CSV, one row per app in report order
pub fn write_csv<W: Write>(report: &ScanReport, wr: W) -> crate::Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(wr);
    writer.write_record(CSV_HEADERS)?;
    for app in &report.apps {
        writer.write_record([
            app.package.as_str(),
            app.installer.as_str(),
            app.status.as_str(),
            app.permissions_display().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv_file(report: &ScanReport, path: &Path) -> crate::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    write_csv(report, BufWriter::new(file))
}

fn get_record_idx(record: &StringRecord, idx: usize) -> crate::Result<&str> {
    record
        .get(idx)
        .ok_or_else(|| crate::Error::Csv(format!("missing column {}", idx)))
}

fn parse_permissions(raw: &str) -> BTreeSet<String> {
    if raw == NO_PERMISSIONS {
        return BTreeSet::new();
    }
    raw.split(PERMISSION_SEPARATOR)
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .map(String::from)
        .collect()
}

impl TryFrom<&StringRecord> for PackageRecord {
    type Error = crate::Error;

    fn try_from(value: &StringRecord) -> Result<Self, Self::Error> {
        let status = get_record_idx(value, 2)?
            .parse::<Status>()
            .map_err(|e| crate::Error::Csv(e.to_string()))?;
        Ok(Self {
            package: get_record_idx(value, 0)?.into(),
            installer: get_record_idx(value, 1)?.into(),
            status,
            dangerous_permissions: parse_permissions(get_record_idx(value, 3)?),
        })
    }
}

/// Read back the rows written by [write_csv]. Device identity isn't part of
/// the tabular format so only the apps come back.
pub fn read_csv<R: Read>(rd: R) -> crate::Result<Vec<PackageRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(rd);

    let headers = reader.headers()?;
    if headers.iter().ne(CSV_HEADERS.iter().copied()) {
        return Err(crate::Error::Csv(format!(
            "unexpected header {:?}",
            headers.iter().collect::<Vec<&str>>()
        )));
    }

    let mut res = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        res.push(PackageRecord::try_from(&record)?);
    }
    Ok(res)
}

pub fn read_csv_file(path: &Path) -> crate::Result<Vec<PackageRecord>> {
    read_csv(open_file(path)?)
}

pub fn to_json(report: &ScanReport) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_json<W: Write>(report: &ScanReport, wr: W) -> crate::Result<()> {
    serde_json::to_writer_pretty(wr, report)?;
    Ok(())
}

pub fn from_json(raw: &str) -> crate::Result<ScanReport> {
    Ok(serde_json::from_str(raw)?)
}

pub fn from_json_file(path: &Path) -> crate::Result<ScanReport> {
    let file = open_file(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Device;
    use crate::testing::{tmp_context, TestContext};
    use rstest::*;

    fn report() -> ScanReport {
        ScanReport {
            device: Device {
                model: "Pixel 7".into(),
                serial: "2A1".into(),
                android_version: "14".into(),
                battery_info: "level: 80".into(),
            },
            apps: vec![
                PackageRecord {
                    package: "com.a".into(),
                    installer: "com.android.vending".into(),
                    status: Status::Safe,
                    dangerous_permissions: BTreeSet::new(),
                },
                PackageRecord {
                    package: "com.b".into(),
                    installer: "evil.store".into(),
                    status: Status::Suspicious,
                    dangerous_permissions: [
                        "android.permission.READ_SMS",
                        "android.permission.CAMERA",
                    ]
                    .iter()
                    .map(|it| it.to_string())
                    .collect(),
                },
            ],
        }
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        write_csv(&report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Package,Installer,Status,Dangerous Permissions\n\
             com.a,com.android.vending,Safe,None\n\
             com.b,evil.store,Suspicious,\"android.permission.CAMERA,android.permission.READ_SMS\"\n"
        );
    }

    #[test]
    fn test_csv_read_back() {
        let report = report();
        let mut out = Vec::new();
        write_csv(&report, &mut out).unwrap();
        let apps = read_csv(out.as_slice()).unwrap();
        assert_eq!(apps, report.apps);
    }

    #[test]
    fn test_read_csv_bad_header() {
        let raw = "pkg,installer,status,perms\ncom.a,x,Safe,None\n";
        assert!(matches!(read_csv(raw.as_bytes()), Err(crate::Error::Csv(_))));
    }

    #[test]
    fn test_read_csv_bad_status() {
        let raw = "Package,Installer,Status,Dangerous Permissions\ncom.a,x,Maybe,None\n";
        assert!(matches!(read_csv(raw.as_bytes()), Err(crate::Error::Csv(_))));
    }

    #[test]
    fn test_read_csv_short_row() {
        let raw = "Package,Installer,Status,Dangerous Permissions\ncom.a,x\n";
        assert!(read_csv(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_json() {
        let report = report();
        let raw = to_json(&report).unwrap();
        assert!(raw.contains("\"android_version\": \"14\""));
        assert_eq!(from_json(&raw).unwrap(), report);
    }

    #[test]
    fn test_json_missing_permissions() {
        let raw = r#"{"device":{"model":"","serial":"s","android_version":"","battery_info":""},
            "apps":[{"package":"com.a","installer":"com.android.vending","status":"Safe"}]}"#;
        let report = from_json(raw).unwrap();
        assert!(report.apps[0].dangerous_permissions.is_empty());
        assert!(matches!(from_json("{"), Err(crate::Error::Json(_))));
    }

    #[rstest]
    fn test_files(tmp_context: TestContext) {
        let report = report();
        let csv_path = tmp_context.get_temp_path(Some(".csv"));
        write_csv_file(&report, &csv_path).unwrap();
        assert_eq!(read_csv_file(&csv_path).unwrap(), report.apps);

        let json_path = tmp_context.get_temp_path(Some(".json"));
        let file = std::fs::File::create(&json_path).unwrap();
        write_json(&report, file).unwrap();
        assert_eq!(from_json_file(&json_path).unwrap(), report);

        assert!(matches!(
            from_json_file(&tmp_context.to_abs("missing.json")),
            Err(crate::Error::MissingFile(_))
        ));
    }
}
