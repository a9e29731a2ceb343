use crate::error::IngestError;
use crate::models::{ContentUnit, DocChunk};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Split text into windows of at most `chunk_size` characters, each window
/// starting `chunk_size - chunk_overlap` characters after the previous one.
///
/// Boundaries depend only on the text and the config, never on ingestion
/// order, so re-chunking unchanged input is byte-identical.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = config.chunk_size - config.chunk_overlap;
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        pieces.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    pieces
}

/// Chunk every content unit, each chunk inheriting its unit's metadata.
pub fn chunk_units(
    units: &[ContentUnit],
    config: ChunkingConfig,
) -> Result<Vec<DocChunk>, IngestError> {
    let mut chunks = Vec::new();
    for unit in units {
        for piece in split_text(&unit.text, config) {
            chunks.push(DocChunk::from_unit(unit, piece));
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> ContentUnit {
        ContentUnit {
            text: text.to_string(),
            source_name: "notes.txt".to_string(),
            is_structured: false,
            row_id: None,
            page: Some(1),
            checksum: "checksum".to_string(),
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 3).is_ok());
    }

    #[test]
    fn chunks_never_exceed_configured_size() {
        let config = ChunkingConfig::new(8, 2).unwrap();
        for piece in split_text("abcdefghijklmnopqrstuvwxyz", config) {
            assert!(piece.chars().count() <= 8);
        }
    }

    #[test]
    fn overlap_removed_concatenation_reconstructs_original() {
        let text = "the quick brown fox jumps over the lazy dog";
        let config = ChunkingConfig::new(10, 4).unwrap();
        let pieces = split_text(text, config);

        let mut rebuilt = String::new();
        for (index, piece) in pieces.iter().enumerate() {
            if index == 0 {
                rebuilt.push_str(piece);
            } else {
                let trailing: String = rebuilt.chars().rev().take(4).collect();
                let overlap: String = piece.chars().take(4).collect();
                assert_eq!(trailing.chars().rev().collect::<String>(), overlap);
                rebuilt.extend(piece.chars().skip(4));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let config = ChunkingConfig::new(12, 3).unwrap();
        let text = "a long enough body of text to span several windows";
        assert_eq!(split_text(text, config), split_text(text, config));
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let config = ChunkingConfig::new(100, 10).unwrap();
        let pieces = split_text("short", config);
        assert_eq!(pieces, vec!["short".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let config = ChunkingConfig::new(100, 10).unwrap();
        assert!(split_text("", config).is_empty());
    }

    #[test]
    fn chunks_inherit_unit_metadata() {
        let config = ChunkingConfig::new(6, 2).unwrap();
        let chunks = chunk_units(&[unit("some chunkable body")], config).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert_eq!(chunk.source_name, "notes.txt");
            assert_eq!(chunk.page, Some(1));
            assert!(!chunk.is_structured);
            assert_eq!(chunk.checksum, "checksum");
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }
}
