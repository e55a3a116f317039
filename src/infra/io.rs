use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Bytes that may appear in text files (BEL, BS, TAB, LF, FF, CR, ESC and
/// everything from space upward except DEL)
fn is_text_byte(b: u8) -> bool {
    matches!(b, 7 | 8 | 9 | 10 | 12 | 13 | 27) || (b >= 0x20 && b != 0x7f)
}

pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl AsRef<[u8]> for FileContent {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => mmap,
            FileContent::Buffered(bytes) => bytes.as_slice(),
        }
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        // Use memory mapping for large files
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: We're only reading the file, not modifying it
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        // Read small files into memory
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Read a text file as lines without terminators. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Heuristic binary check on the first 256 bytes of a file
pub fn seems_binary(prefix: &[u8]) -> bool {
    prefix
        .iter()
        .take(256)
        .any(|&b| !is_text_byte(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_seems_binary() {
        assert!(!seems_binary(b"int main() {\n\treturn 0;\n}\n"));
        assert!(!seems_binary("caf\u{e9}".as_bytes()));
        assert!(seems_binary(b"PK\x03\x04\x00\x00"));
        assert!(seems_binary(b"abc\x7f"));
    }

    #[test]
    fn test_read_lines_strips_terminators() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "one\r\ntwo\n\nfour").unwrap();
        let lines = read_lines(f.path()).unwrap();
        assert_eq!(lines, vec!["one", "two", "", "four"]);
    }

    #[test]
    fn test_read_file_smart_small() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"payload").unwrap();
        let content = read_file_smart(f.path()).unwrap();
        assert_eq!(content.as_ref(), b"payload");
    }
}
