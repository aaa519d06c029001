//! Chapter tags: RIFF INFO chunks for WAV and FFMETADATA files for ffmpeg.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Metadata stamped on a finished chapter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTags {
    /// 1-based position of the chapter in the book
    pub chapter_index: usize,
    pub total_chapters: usize,
    pub chapter_title: String,
    pub book_title: String,
    pub author: String,
}

impl AudioTags {
    /// Track number in `n/total` form.
    pub fn track(&self) -> String {
        format!("{}/{}", self.chapter_index, self.total_chapters)
    }
}

/// Build a `LIST` chunk of type `INFO` holding the tags.
pub fn riff_info_chunk(tags: &AudioTags) -> Vec<u8> {
    let fields: [(&[u8; 4], String); 5] = [
        (b"INAM", tags.chapter_title.clone()),
        (b"IART", tags.author.clone()),
        (b"IPRD", tags.book_title.clone()),
        (b"ITRK", tags.track()),
        (b"IGNR", "Audiobook".to_string()),
    ];

    let mut body = b"INFO".to_vec();
    for (id, value) in fields {
        // NUL-terminated, padded to an even length
        let mut data = value.into_bytes();
        data.push(0);
        body.extend_from_slice(id);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(&data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }

    let mut chunk = b"LIST".to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&body);
    chunk
}

/// Write an FFMETADATA1 file that ffmpeg maps onto the output with
/// `-map_metadata`.
pub fn create_ffmpeg_metadata(tags: &AudioTags, output_path: &Path) -> io::Result<()> {
    let mut file = File::create(output_path)?;

    writeln!(file, ";FFMETADATA1")?;
    writeln!(file, "title={}", escape_metadata_value(&tags.chapter_title))?;
    writeln!(file, "artist={}", escape_metadata_value(&tags.author))?;
    writeln!(file, "album={}", escape_metadata_value(&tags.book_title))?;
    writeln!(file, "track={}", tags.track())?;
    writeln!(file, "genre=Audiobook")?;

    file.sync_all()
}

/// Escape special characters in metadata values.
///
/// FFmpeg metadata values need to escape: = ; # \ and newlines
fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tags() -> AudioTags {
        AudioTags {
            chapter_index: 3,
            total_chapters: 12,
            chapter_title: "Chapter_One".to_string(),
            book_title: "My Book".to_string(),
            author: "Jane Doe".to_string(),
        }
    }

    #[test]
    fn test_track() {
        assert_eq!(sample_tags().track(), "3/12");
    }

    #[test]
    fn test_escape_metadata_value() {
        assert_eq!(escape_metadata_value("Simple"), "Simple");
        assert_eq!(escape_metadata_value("Test=Value"), "Test\\=Value");
        assert_eq!(escape_metadata_value("Test;Value"), "Test\\;Value");
        assert_eq!(escape_metadata_value("Test#Value"), "Test\\#Value");
        assert_eq!(escape_metadata_value("Test\\Value"), "Test\\\\Value");
        assert_eq!(escape_metadata_value("Line1\r\nLine2"), "Line1\\nLine2");
    }

    #[test]
    fn test_riff_info_chunk_layout() {
        let chunk = riff_info_chunk(&sample_tags());
        assert_eq!(&chunk[0..4], b"LIST");
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as usize;
        assert_eq!(size, chunk.len() - 8);
        assert_eq!(&chunk[8..12], b"INFO");
        assert_eq!(&chunk[12..16], b"INAM");
        // "Chapter_One" + NUL = 12 bytes, already even
        assert_eq!(u32::from_le_bytes([chunk[16], chunk[17], chunk[18], chunk[19]]), 12);
        assert_eq!(&chunk[20..32], b"Chapter_One\0");
        assert_eq!(&chunk[32..36], b"IART");
        assert_eq!(chunk.len() % 2, 0);
    }

    #[test]
    fn test_create_ffmpeg_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let metadata_path = temp_dir.path().join("metadata.txt");

        create_ffmpeg_metadata(&sample_tags(), &metadata_path).unwrap();

        let content = std::fs::read_to_string(&metadata_path).unwrap();
        assert!(content.starts_with(";FFMETADATA1\n"));
        assert!(content.contains("title=Chapter_One"));
        assert!(content.contains("artist=Jane Doe"));
        assert!(content.contains("album=My Book"));
        assert!(content.contains("track=3/12"));
    }
}
