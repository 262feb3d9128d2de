use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MOUNTS_PATH: &str = "/proc/self/mounts";

/// Mount options that indicate active disk quotas
const QUOTA_OPTIONS: [&str; 6] = [
    "usrquota",
    "grpquota",
    "prjquota",
    "quota",
    "usrjquota",
    "grpjquota",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
    pub options: Vec<String>,
}

impl MountEntry {
    pub fn has_quota(&self) -> bool {
        self.options.iter().any(|opt| {
            let name = opt.split('=').next().unwrap_or(opt);
            QUOTA_OPTIONS.contains(&name)
        })
    }
}

/// Snapshot of the kernel mount table
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn load() -> io::Result<Self> {
        let contents = fs::read_to_string(MOUNTS_PATH)?;
        Ok(Self::parse(&contents))
    }

    /// Parse `/proc/mounts` format. Malformed lines are skipped.
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 4 {
                    return None;
                }
                Some(MountEntry {
                    device: unescape(parts[0]),
                    mount_point: PathBuf::from(unescape(parts[1])),
                    fs_type: parts[2].to_string(),
                    options: parts[3].split(',').map(str::to_string).collect(),
                })
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// The mount whose mount point is the longest prefix of `path`.
    ///
    /// Later entries win ties, matching over-mount semantics.
    pub fn find(&self, path: &Path) -> Option<&MountEntry> {
        self.entries
            .iter()
            .filter(|e| path.starts_with(&e.mount_point))
            .fold(None, |best: Option<&MountEntry>, e| match best {
                Some(b) if b.mount_point.as_os_str().len() > e.mount_point.as_os_str().len() => {
                    Some(b)
                }
                _ => Some(e),
            })
    }
}

/// Undo the octal escapes (`\040` for space) the kernel applies to mount fields
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).ok();
            if let Some(value) = digits.and_then(|d| u8::from_str_radix(d, 8).ok()) {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
