use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub trait CommandExt {
    /// Succeeds when the program could be started at all, whatever its exit status.
    fn spawns(&mut self) -> io::Result<()>;
}

impl CommandExt for Command {
    fn spawns(&mut self) -> io::Result<()> {
        self.stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|_| ())
    }
}

/// Walks from `dir` up to the filesystem root and returns the first `filename` found.
pub fn find_up(filename: &str, dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|ancestor| ancestor.join(filename))
        .find(|candidate| candidate.exists())
}

/// Joins `path` onto `base` unless it is already absolute.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        normalize(&base.join(path))
    }
}

/// Lexically drops `.` and resolves `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` relative to `base`, if `path` lives below it.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(Path::to_path_buf)
}
