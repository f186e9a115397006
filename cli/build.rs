use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::Command,
};

fn main() {
    if let Err(e) = write_version_files() {
        panic!("Failed to create the version files: {:?}", e);
    }
    println!("cargo:rerun-if-env-changed=DROIDSCAN_GIT_REVISION");
    println!("cargo:rerun-if-changed=build.rs");
}

fn out_path(name: &str) -> io::Result<PathBuf> {
    let out_dir = env::var("OUT_DIR").map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
    Ok(Path::new(&out_dir).join(name))
}

fn write_version_files() -> io::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let target = env::var("TARGET").unwrap_or_else(|_| String::from("unknown target"));
    let rev = git_rev().unwrap_or_else(|| String::from("unknown"));

    let mut simple = fs::File::create(out_path("simple_version_string")?)?;
    write!(simple, "\"{}\"", version)?;

    let mut full = fs::File::create(out_path("version_string")?)?;
    write!(
        full,
        "r#\"{} ({})\nrev {}\"#",
        version, target, rev
    )?;
    Ok(())
}

fn git_rev() -> Option<String> {
    if let Ok(rev) = env::var("DROIDSCAN_GIT_REVISION") {
        return Some(rev.trim().into());
    }

    let from_git = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_string());

    from_git.or_else(git_rev_from_head)
}

/// Resolve `.git/HEAD` by hand when git itself isn't around
fn git_rev_from_head() -> Option<String> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).parent()?.join(".git");
    let head = fs::read_to_string(root.join("HEAD")).ok()?;
    let head = head.trim();
    let rev = match head.strip_prefix("ref: ") {
        Some(reference) => fs::read_to_string(root.join(reference)).ok()?,
        None => head.to_string(),
    };
    Some(rev.trim().chars().take(7).collect())
}
