use crate::adb::Adb;
use crate::markers::{
    is_package_line, INSTALLER_MARKER, LIST_PACKAGES_CMD, PACKAGE_MARKER, UNKNOWN_INSTALLER,
};
use crate::model::PackageEntry;

/// Parse a single `pm list packages -i` line.
///
/// Lines look like `package:com.example installer=com.android.vending`, the
/// installer part is missing on some Android versions and `null` for
/// sideloaded apps.
pub fn parse_package_line(line: &str) -> Option<PackageEntry> {
    if !is_package_line(line) {
        return None;
    }
    let stripped = line.replace(PACKAGE_MARKER, "");
    let mut parts = stripped.splitn(2, INSTALLER_MARKER);

    let package = parts.next().map(str::trim).unwrap_or_default();
    if package.is_empty() {
        return None;
    }

    let installer = parts
        .next()
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .unwrap_or(UNKNOWN_INSTALLER);

    Some(PackageEntry {
        package: package.into(),
        installer: installer.into(),
    })
}

/// Parse the full output of `pm list packages -i`, skipping anything that
/// isn't a package line. Device order and duplicates are kept.
pub fn parse_package_list(output: &str) -> Vec<PackageEntry> {
    output.lines().filter_map(parse_package_line).collect()
}

/// List every installed package along with its installer
pub fn list_packages(adb: &dyn Adb) -> crate::Result<Vec<PackageEntry>> {
    let output = adb.run_command(LIST_PACKAGES_CMD)?;
    let entries = parse_package_list(&output);
    log::debug!("device reported {} packages", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{mock_adb, MockAdb};
    use mockall::predicate::eq;
    use rstest::*;

    fn entry(package: &str, installer: &str) -> PackageEntry {
        PackageEntry {
            package: package.into(),
            installer: installer.into(),
        }
    }

    #[test]
    fn test_parse_line_with_installer() {
        assert_eq!(
            parse_package_line("package:com.a installer=com.android.vending"),
            Some(entry("com.a", "com.android.vending"))
        );
    }

    #[test]
    fn test_parse_line_without_installer() {
        assert_eq!(
            parse_package_line("package:com.a"),
            Some(entry("com.a", "unknown"))
        );
        assert_eq!(
            parse_package_line("package:com.a installer="),
            Some(entry("com.a", "unknown"))
        );
    }

    #[test]
    fn test_parse_line_sideloaded() {
        assert_eq!(
            parse_package_line("package:com.a  installer=null\r"),
            Some(entry("com.a", "null"))
        );
    }

    #[test]
    fn test_parse_line_rejects() {
        assert_eq!(parse_package_line("garbage"), None);
        assert_eq!(parse_package_line(""), None);
        assert_eq!(parse_package_line("package:"), None);
        assert_eq!(parse_package_line("package:   installer=evil.store"), None);
    }

    #[test]
    fn test_parse_list_keeps_order_and_duplicates() {
        let out = "package:com.b installer=evil.store\n\ngarbage\npackage:com.a installer=com.android.vending\npackage:com.b installer=evil.store\n";
        assert_eq!(
            parse_package_list(out),
            vec![
                entry("com.b", "evil.store"),
                entry("com.a", "com.android.vending"),
                entry("com.b", "evil.store"),
            ]
        );
    }

    #[test]
    fn test_every_entry_has_package() {
        let out = "package:\npackage: \n \npackage:x installer=y\nfoo installer=bar";
        let entries = parse_package_list(out);
        assert_eq!(entries.len(), 1);
        assert!(entries.iter().all(|it| !it.package.is_empty()));
    }

    #[rstest]
    fn test_list_packages(mut mock_adb: MockAdb) {
        mock_adb
            .expect_run_command()
            .with(eq("pm list packages -i"))
            .times(1)
            .returning(|_| Ok("package:com.a installer=com.android.vending\n".into()));
        let entries = list_packages(&mock_adb).expect("should list");
        assert_eq!(entries, vec![entry("com.a", "com.android.vending")]);
    }

    #[rstest]
    fn test_list_packages_error(mut mock_adb: MockAdb) {
        mock_adb
            .expect_run_command()
            .returning(|_| Err(crate::Error::CommandError(1, "boom".into())));
        assert!(list_packages(&mock_adb).is_err());
    }
}
