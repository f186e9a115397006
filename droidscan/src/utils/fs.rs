use std::borrow::Cow;
use std::fs::{self, create_dir_all, File};
use std::io::{self, ErrorKind};
use std::path::Path;

pub fn ensure_dir_exists(p: &Path) -> io::Result<()> {
    if p.exists() {
        return Ok(());
    }

    create_dir_all(p)
}

/// Lossy string form of a path, used for messages and error values
pub fn path_must_str(path: &Path) -> Cow<'_, str> {
    path.to_string_lossy()
}

pub fn open_file(path: &Path) -> crate::Result<File> {
    match File::open(path) {
        Ok(v) => Ok(v),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Err(crate::Error::MissingFile(path_must_str(path).into())),
            _ => Err(e.into()),
        },
    }
}

pub fn read_file(path: &Path) -> crate::Result<String> {
    match fs::read_to_string(path) {
        Ok(v) => Ok(v),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Err(crate::Error::MissingFile(path_must_str(path).into())),
            _ => Err(e.into()),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{tmp_context, TestContext};
    use rstest::*;

    #[rstest]
    fn test_read_missing_file(tmp_context: TestContext) {
        let path = tmp_context.get_temp_path(Some("txt"));
        match read_file(&path) {
            Err(crate::Error::MissingFile(p)) => assert_eq!(p, path_must_str(&path)),
            other => panic!("expected MissingFile, got {:?}", other.map(|_| ())),
        }
    }

    #[rstest]
    fn test_ensure_dir_exists(tmp_context: TestContext) {
        let dir = tmp_context.get_temp_dir().join("nested").join("dir");
        ensure_dir_exists(&dir).expect("create dir");
        assert!(dir.is_dir());
        ensure_dir_exists(&dir).expect("existing dir is fine");
    }
}
