//! File I/O capability: a small-integer handle table over buffered files,
//! a Shift-JIS line codec, and the INI helpers.
//!
//! The platform's data files are Shift-JIS with CRLF line endings; lines
//! cross the capability boundary as Unicode text and are transcoded here.
//! Undecodable bytes are replaced rather than faulted, matching the
//! platform's permissive reads.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use encoding_rs::SHIFT_JIS;
use filly_vm::host::{FileIo, FileMode};
use filly_vm::vm::VmError;

#[derive(Debug)]
enum OpenFile {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

#[derive(Debug, Default)]
pub struct StdFileIo {
    handles: HashMap<i64, OpenFile>,
    next_handle: i64,
}

impl StdFileIo {
    pub fn new() -> Self {
        Self::default()
    }

    fn io_err(context: &str, e: std::io::Error) -> VmError {
        VmError::Capability(format!("{}: {}", context, e))
    }

    fn handle_mut(&mut self, handle: i64) -> Result<&mut OpenFile, VmError> {
        self.handles
            .get_mut(&handle)
            .ok_or_else(|| VmError::Capability(format!("unknown file handle {}", handle)))
    }
}

impl FileIo for StdFileIo {
    fn open(&mut self, path: &str, mode: FileMode) -> Result<i64, VmError> {
        let open_file = match mode {
            FileMode::Read => {
                let f = File::open(path).map_err(|e| Self::io_err(path, e))?;
                OpenFile::Reader(BufReader::new(f))
            }
            FileMode::Write => {
                let f = File::create(path).map_err(|e| Self::io_err(path, e))?;
                OpenFile::Writer(BufWriter::new(f))
            }
            FileMode::Append => {
                let f = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Self::io_err(path, e))?;
                OpenFile::Writer(BufWriter::new(f))
            }
        };
        self.next_handle += 1;
        self.handles.insert(self.next_handle, open_file);
        Ok(self.next_handle)
    }

    fn close(&mut self, handle: i64) -> Result<(), VmError> {
        match self.handles.remove(&handle) {
            Some(OpenFile::Writer(mut w)) => w
                .flush()
                .map_err(|e| Self::io_err("flush on close", e)),
            Some(OpenFile::Reader(_)) => Ok(()),
            None => Err(VmError::Capability(format!(
                "unknown file handle {}",
                handle
            ))),
        }
    }

    fn seek(&mut self, handle: i64, pos: u64) -> Result<(), VmError> {
        match self.handle_mut(handle)? {
            OpenFile::Reader(r) => r.seek(SeekFrom::Start(pos)),
            OpenFile::Writer(w) => w.seek(SeekFrom::Start(pos)),
        }
        .map(|_| ())
        .map_err(|e| Self::io_err("seek", e))
    }

    fn read_line(&mut self, handle: i64) -> Result<Option<String>, VmError> {
        let reader = match self.handle_mut(handle)? {
            OpenFile::Reader(r) => r,
            OpenFile::Writer(_) => {
                return Err(VmError::Capability(format!(
                    "handle {} is open for writing",
                    handle
                )))
            }
        };
        let mut raw = Vec::new();
        let n = reader
            .read_until(b'\n', &mut raw)
            .map_err(|e| Self::io_err("read", e))?;
        if n == 0 {
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let (text, _encoding, _had_errors) = SHIFT_JIS.decode(&raw);
        Ok(Some(text.into_owned()))
    }

    fn write_line(&mut self, handle: i64, line: &str) -> Result<(), VmError> {
        let writer = match self.handle_mut(handle)? {
            OpenFile::Writer(w) => w,
            OpenFile::Reader(_) => {
                return Err(VmError::Capability(format!(
                    "handle {} is open for reading",
                    handle
                )))
            }
        };
        let (bytes, _encoding, _unmappable) = SHIFT_JIS.encode(line);
        writer
            .write_all(&bytes)
            .and_then(|_| writer.write_all(b"\r\n"))
            .map_err(|e| Self::io_err("write", e))
    }

    fn read_ini(
        &mut self,
        path: &str,
        section: &str,
        key: &str,
    ) -> Result<Option<String>, VmError> {
        if !Path::new(path).exists() {
            return Ok(None);
        }
        let text = read_sjis(path)?;
        Ok(ini_get(&text, section, key))
    }

    fn write_ini(
        &mut self,
        path: &str,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<(), VmError> {
        let text = if Path::new(path).exists() {
            read_sjis(path)?
        } else {
            String::new()
        };
        let updated = ini_set(&text, section, key, value);
        write_sjis(path, &updated)
    }

    fn close_all(&mut self) {
        for (_, open_file) in self.handles.drain() {
            if let OpenFile::Writer(mut w) = open_file {
                if let Err(e) = w.flush() {
                    log::warn!("flush on shutdown: {}", e);
                }
            }
        }
    }
}

fn read_sjis(path: &str) -> Result<String, VmError> {
    let mut raw = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut raw))
        .map_err(|e| StdFileIo::io_err(path, e))?;
    let (text, _encoding, _had_errors) = SHIFT_JIS.decode(&raw);
    Ok(text.into_owned())
}

fn write_sjis(path: &str, text: &str) -> Result<(), VmError> {
    let (bytes, _encoding, _unmappable) = SHIFT_JIS.encode(text);
    std::fs::write(path, &bytes).map_err(|e| StdFileIo::io_err(path, e))
}

/// Look up `key` under `[section]`. Section and key names compare
/// case-insensitively.
fn ini_get(text: &str, section: &str, key: &str) -> Option<String> {
    let mut in_section = false;
    for line in text.lines() {
        let line = line.trim();
        if let Some(name) = section_header(line) {
            in_section = name.eq_ignore_ascii_case(section);
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim().eq_ignore_ascii_case(key) {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

/// Produce `text` with `key=value` stored under `[section]`, updating an
/// existing entry in place or appending the section at the end.
fn ini_set(text: &str, section: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut section_start = None;
    let mut section_end = lines.len();
    for (i, line) in lines.iter().enumerate() {
        if let Some(name) = section_header(line.trim()) {
            if section_start.is_some() {
                section_end = i;
                break;
            }
            if name.eq_ignore_ascii_case(section) {
                section_start = Some(i);
            }
        }
    }
    match section_start {
        Some(start) => {
            for line in &mut lines[start + 1..section_end] {
                if let Some((k, _)) = line.split_once('=') {
                    if k.trim().eq_ignore_ascii_case(key) {
                        *line = format!("{}={}", key, value);
                        return join_ini(lines);
                    }
                }
            }
            lines.insert(section_end, format!("{}={}", key, value));
        }
        None => {
            lines.push(format!("[{}]", section));
            lines.push(format!("{}={}", key, value));
        }
    }
    join_ini(lines)
}

fn join_ini(lines: Vec<String>) -> String {
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ini_get_finds_key_in_section() {
        let text = "[Main]\r\nname=son\r\n[Other]\r\nname=else\r\n";
        assert_eq!(ini_get(text, "Main", "name").as_deref(), Some("son"));
        assert_eq!(ini_get(text, "Other", "name").as_deref(), Some("else"));
        assert_eq!(ini_get(text, "main", "NAME").as_deref(), Some("son"));
        assert_eq!(ini_get(text, "Missing", "name"), None);
        assert_eq!(ini_get(text, "Main", "missing"), None);
    }

    #[test]
    fn test_ini_set_round_trips() {
        let text = ini_set("", "Main", "k", "v");
        assert_eq!(ini_get(&text, "Main", "k").as_deref(), Some("v"));

        let text = ini_set(&text, "Main", "k", "w");
        assert_eq!(ini_get(&text, "Main", "k").as_deref(), Some("w"));
        assert_eq!(text.matches("k=").count(), 1);

        let text = ini_set(&text, "Main", "j", "2");
        assert_eq!(ini_get(&text, "Main", "j").as_deref(), Some("2"));
        assert_eq!(ini_get(&text, "Main", "k").as_deref(), Some("w"));
    }

    #[test]
    fn test_ini_set_updates_correct_section() {
        let text = "[A]\r\nk=1\r\n[B]\r\nk=2\r\n";
        let updated = ini_set(text, "B", "k", "9");
        assert_eq!(ini_get(&updated, "A", "k").as_deref(), Some("1"));
        assert_eq!(ini_get(&updated, "B", "k").as_deref(), Some("9"));
    }

    #[test]
    fn test_line_round_trip_through_shift_jis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        let path = path.to_str().unwrap();

        let mut io = StdFileIo::new();
        let h = io.open(path, FileMode::Write).unwrap();
        io.write_line(h, "こんにちは世界").unwrap();
        io.write_line(h, "plain ascii").unwrap();
        io.close(h).unwrap();

        let h = io.open(path, FileMode::Read).unwrap();
        assert_eq!(io.read_line(h).unwrap().as_deref(), Some("こんにちは世界"));
        assert_eq!(io.read_line(h).unwrap().as_deref(), Some("plain ascii"));
        assert_eq!(io.read_line(h).unwrap(), None);
        io.close(h).unwrap();
    }

    #[test]
    fn test_seek_rewinds_a_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seek.txt");
        let path = path.to_str().unwrap();

        let mut io = StdFileIo::new();
        let h = io.open(path, FileMode::Write).unwrap();
        io.write_line(h, "first").unwrap();
        io.close(h).unwrap();

        let h = io.open(path, FileMode::Read).unwrap();
        assert_eq!(io.read_line(h).unwrap().as_deref(), Some("first"));
        io.seek(h, 0).unwrap();
        assert_eq!(io.read_line(h).unwrap().as_deref(), Some("first"));
        io.close(h).unwrap();
    }

    #[test]
    fn test_unknown_handle_is_an_error() {
        let mut io = StdFileIo::new();
        assert!(io.read_line(99).is_err());
        assert!(io.close(99).is_err());
    }

    #[test]
    fn test_ini_through_capability_interface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.ini");
        let path = path.to_str().unwrap();

        let mut io = StdFileIo::new();
        assert_eq!(io.read_ini(path, "S", "k").unwrap(), None);
        io.write_ini(path, "S", "k", "値").unwrap();
        assert_eq!(io.read_ini(path, "S", "k").unwrap().as_deref(), Some("値"));
    }
}
