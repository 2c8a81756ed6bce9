use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Only the end of the file is read; a few lines never need more.
const TAIL_BYTES: u64 = 64 * 1024;

/// Last `max_lines` lines of `path`, newlines included.
///
/// Best-effort: unreadable or vanished files yield an empty string, and
/// invalid UTF-8 is replaced rather than rejected.
pub fn read_tail(path: &Path, max_lines: usize) -> String {
    if max_lines == 0 {
        return String::new();
    }
    read_tail_bytes(path)
        .map(|bytes| last_lines(&String::from_utf8_lossy(&bytes), max_lines))
        .unwrap_or_default()
}

fn read_tail_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = fs_err::File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_BYTES);
    file.seek(SeekFrom::Start(start))?;

    let mut bytes = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut bytes)?;

    // Drop the partial first line when we started mid-file.
    if start > 0 {
        if let Some(newline) = bytes.iter().position(|&b| b == b'\n') {
            bytes.drain(..=newline);
        }
    }
    Ok(bytes)
}

fn last_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines[skip..].concat()
}
