use std::{fs, io::ErrorKind};

use bytes::Bytes;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use http::{StatusCode, Version};
use walkdir::WalkDir;

use crate::{error::Error, serializer};

const EXTENSION: &str = "golden";

/// Reference files keyed by hierarchical test name, stored as `<root>/<name>.golden`.
#[derive(Debug, Clone)]
pub struct GoldenStore {
    root: Utf8PathBuf,
}

impl GoldenStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Utf8PathBuf {
        self.root.join(format!("{name}.{EXTENSION}"))
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, Error> {
        validate_name(name)?;
        let path = self.path_for(name);
        fs::read(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                Error::MissingGolden { path }
            } else {
                Error::Io { source, path }
            }
        })
    }

    /// Overwrite the record for `name`, creating parent directories as needed.
    pub fn write(&self, name: &str, data: &[u8]) -> Result<Utf8PathBuf, Error> {
        validate_name(name)?;
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                source,
                path: parent.to_path_buf(),
            })?;
        }
        fs::write(&path, data).map_err(|source| Error::Io {
            source,
            path: path.clone(),
        })?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<GoldenRecord, Error> {
        let data = self.read(name)?;
        GoldenRecord::parse(&data).map_err(|reason| Error::InvalidRecord {
            path: self.path_for(name),
            reason,
        })
    }

    /// Names of every record under the root, sorted.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|err| Error::Io {
                path: err
                    .path()
                    .and_then(|p| Utf8Path::from_path(p))
                    .map(Utf8Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone()),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                continue;
            };
            if path.extension() != Some(EXTENSION) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .with_extension("")
                .components()
                .map(|component| component.as_str())
                .collect::<Vec<_>>()
                .join("/");
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

/// Reject names that would land outside the store root.
fn validate_name(name: &str) -> Result<(), Error> {
    let invalid = |reason| Error::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    let path = Utf8Path::new(name);
    if path.is_absolute() || name.starts_with('/') {
        return Err(invalid("absolute names are not allowed"));
    }
    for component in path.components() {
        match component {
            Utf8Component::Normal(_) | Utf8Component::CurDir => {}
            Utf8Component::ParentDir => return Err(invalid("name escapes the testdata root")),
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(invalid("absolute names are not allowed"));
            }
        }
    }
    Ok(())
}

/// A stored response parsed back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenRecord {
    pub version: Version,
    pub status: StatusCode,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Bytes,
}

impl GoldenRecord {
    pub fn parse(data: &[u8]) -> Result<Self, String> {
        let split = data
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .ok_or_else(|| "missing blank line after headers".to_string())?;
        let head = std::str::from_utf8(&data[..split])
            .map_err(|err| format!("header section is not UTF-8: {err}"))?;
        let body = Bytes::copy_from_slice(&data[split + 4..]);

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let (version, status) = parse_status_line(status_line)?;

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| format!("malformed header line {line:?}"))?;
            headers.push((name.to_string(), value.as_bytes().to_vec()));
        }

        Ok(Self {
            version,
            status,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| std::str::from_utf8(value).ok())
    }

    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|value| value.starts_with("application/json"))
    }

    pub fn to_bytes(&self, include_body: bool) -> Vec<u8> {
        let body = include_body.then_some(self.body.as_ref());
        serializer::render(self.version, self.status, &self.headers, body)
    }
}

fn parse_status_line(line: &str) -> Result<(Version, StatusCode), String> {
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/0.9") => Version::HTTP_09,
        Some("HTTP/1.0") => Version::HTTP_10,
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/2.0") => Version::HTTP_2,
        Some("HTTP/3.0") => Version::HTTP_3,
        _ => return Err(format!("malformed status line {line:?}")),
    };
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| format!("malformed status line {line:?}"))?;
    Ok((version, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, GoldenStore) {
        let dir = tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().join("testdata")).unwrap();
        (dir, GoldenStore::new(root))
    }

    #[test]
    fn path_for_joins_hierarchical_name() {
        let store = GoldenStore::new("testdata");
        assert_eq!(
            store.path_for("user_scenario/1_UserPost_registration"),
            Utf8PathBuf::from("testdata/user_scenario/1_UserPost_registration.golden")
        );
    }

    #[test]
    fn write_creates_directories_and_overwrites() {
        let (_dir, store) = store();
        let path = store.write("health/v1_health_200", b"first").unwrap();
        assert!(path.exists());
        store.write("health/v1_health_200", b"second").unwrap();
        assert_eq!(store.read("health/v1_health_200").unwrap(), b"second");
    }

    #[test]
    fn read_missing_record_is_fatal() {
        let (_dir, store) = store();
        let err = store.read("nothing/here").unwrap_err();
        assert!(matches!(err, Error::MissingGolden { ref path } if path.ends_with("nothing/here.golden")));
    }

    #[test]
    fn names_escaping_the_root_are_rejected() {
        let (_dir, store) = store();
        for name in ["", "/etc/passwd", "../outside", "a/../../b"] {
            let err = store.write(name, b"x").unwrap_err();
            assert!(matches!(err, Error::InvalidName { .. }), "{name}: {err}");
        }
    }

    #[test]
    fn list_returns_sorted_names() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
        store.write("b/two", b"x").unwrap();
        store.write("a/one", b"x").unwrap();
        store.write("a/nested/three", b"x").unwrap();
        fs::write(store.root().join("a/notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a/nested/three", "a/one", "b/two"]);
    }

    #[test]
    fn record_parse_round_trips() {
        let data = b"HTTP/1.1 500 Internal Server Error\r\n\
                     content-type: text/plain; charset=utf-8\r\n\
                     x-content-type-options: nosniff\r\n\
                     \r\n\
                     Server error\n";
        let record = GoldenRecord::parse(data).unwrap();
        assert_eq!(record.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(record.header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert!(!record.is_json());
        assert_eq!(record.body, "Server error\n");
        assert_eq!(record.to_bytes(true), data.to_vec());
    }

    #[test]
    fn record_parse_rejects_garbage() {
        assert!(GoldenRecord::parse(b"no separator").is_err());
        assert!(GoldenRecord::parse(b"HTTP/1.1 abc\r\n\r\n").is_err());
        assert!(GoldenRecord::parse(b"HTTP/1.1 200 OK\r\nbroken\r\n\r\n").is_err());
    }
}
