use crate::error::ConfigError;
use crate::models::{Chunk, Page};
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::OnceLock;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// The window must advance on every step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "chunk_size",
                value: "0".to_string(),
            });
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::ChunkOverlap {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

fn collapse_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:[.\u{2026}]{2,}|\s)+").expect("collapse pattern is a valid regex")
    })
}

/// Collapses whitespace runs and dot/ellipsis leader runs into one space.
///
/// Adjacent runs of either kind are merged into a single space, which keeps
/// the function idempotent.
pub fn normalize_text(text: &str) -> String {
    collapse_pattern()
        .replace_all(text, " ")
        .trim()
        .to_string()
}

/// Document text merged across pages, with the page of every character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStream {
    chars: Vec<char>,
    pages: Vec<u32>,
}

impl PageStream {
    /// Joins the normalized page texts with a single space. The separator is
    /// attributed to the page that follows it.
    pub fn from_pages(pages: &[Page]) -> Self {
        let mut stream = Self::default();

        for page in pages {
            let normalized = normalize_text(&page.text);
            if normalized.is_empty() {
                continue;
            }
            if !stream.chars.is_empty() {
                stream.chars.push(' ');
                stream.pages.push(page.page_no);
            }
            for character in normalized.chars() {
                stream.chars.push(character);
                stream.pages.push(page.page_no);
            }
        }

        stream
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn text(&self, range: Range<usize>) -> String {
        self.chars[range].iter().collect()
    }

    /// Distinct pages tagged inside `range`, ascending.
    pub fn pages_in(&self, range: Range<usize>) -> Vec<u32> {
        self.pages[range]
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Untrimmed window ranges over a buffer of `len` characters.
pub fn window_ranges(len: usize, config: ChunkingConfig) -> impl Iterator<Item = Range<usize>> {
    let chunk_size = config.chunk_size.max(1);
    let stride = config.chunk_size.saturating_sub(config.overlap).max(1);

    (0..len)
        .step_by(stride)
        .map(move |start| start..(start + chunk_size).min(len))
}

pub fn chunk_pages(pages: &[Page], config: ChunkingConfig) -> Result<Vec<Chunk>, ConfigError> {
    config.validate()?;

    let stream = PageStream::from_pages(pages);
    let mut chunks = Vec::new();

    for range in window_ranges(stream.len(), config) {
        let raw = stream.text(range.clone());
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        chunks.push(Chunk {
            page_no: stream.pages_in(range.clone()),
            chunk_text: trimmed.to_string(),
            start: range.start,
            end: range.end,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn whitespace_and_leaders_are_collapsed() {
        assert_eq!(normalize_text("  A  \t  lot\nof   spacing "), "A lot of spacing");
        assert_eq!(normalize_text("Contents.......3"), "Contents 3");
        assert_eq!(normalize_text("Intro\u{2026}\u{2026}1"), "Intro 1");
        assert_eq!(normalize_text("End of sentence. Next"), "End of sentence. Next");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "",
            "   ",
            "plain text",
            "a.. .b",
            "x.  ..y",
            "a . .. b",
            "line\n\n\tbreaks\r\nand\u{a0}nbsp",
            "....leading and trailing....",
            "single. dot. per. sentence.",
            "mixed \u{2026}. \u{2026} runs",
        ];

        for sample in samples {
            let once = normalize_text(sample);
            assert_eq!(normalize_text(&once), once, "input: {sample:?}");
        }
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(ChunkingConfig::new(10, 10).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 9).is_ok());
        assert!(chunk_pages(&[Page::new(0, "text")], config(5, 7)).is_err());
    }

    #[test]
    fn separator_belongs_to_following_page() {
        let stream = PageStream::from_pages(&[Page::new(0, "ab"), Page::new(3, "cd")]);

        assert_eq!(stream.text(0..stream.len()), "ab cd");
        assert_eq!(stream.pages_in(2..3), vec![3]);
        assert_eq!(stream.pages_in(0..2), vec![0]);
    }

    #[test]
    fn chunk_spanning_a_page_break_reports_both_pages() {
        let pages = [
            Page::new(0, "a".repeat(50)),
            Page::new(1, "b".repeat(69)),
        ];
        let stream = PageStream::from_pages(&pages);
        assert_eq!(stream.len(), 120);
        assert_eq!(stream.pages_in(0..50), vec![0]);
        assert_eq!(stream.pages_in(50..120), vec![1]);

        let chunks = chunk_pages(&pages, config(30, 20)).expect("valid config");
        let spanning = chunks
            .iter()
            .find(|chunk| chunk.start == 40)
            .expect("window starting at 40");

        assert_eq!(spanning.end, 70);
        assert_eq!(spanning.page_no, vec![0, 1]);
    }

    #[test]
    fn windows_cover_the_whole_buffer() {
        for (len, chunk_size, overlap) in [(0, 5, 1), (1, 5, 1), (120, 30, 20), (97, 10, 0), (1000, 500, 60)] {
            let mut covered = vec![false; len];
            let mut previous_start = None;

            for range in window_ranges(len, config(chunk_size, overlap)) {
                if let Some(previous) = previous_start {
                    assert_eq!(range.start - previous, chunk_size - overlap);
                }
                previous_start = Some(range.start);
                for index in range {
                    covered[index] = true;
                }
            }

            assert!(covered.iter().all(|value| *value), "len={len} size={chunk_size}");
        }
    }

    #[test]
    fn chunks_are_trimmed_and_follow_stride() {
        let pages = [Page::new(0, "one two three four five six")];
        let chunks = chunk_pages(&pages, config(10, 2)).expect("valid config");

        let starts = chunks.iter().map(|chunk| chunk.start).collect::<Vec<_>>();
        assert_eq!(starts, vec![0, 8, 16, 24]);
        assert_eq!(chunks[0].chunk_text, "one two th");
        assert_eq!(chunks[1].chunk_text, "three four");
        assert_eq!(chunks[3].chunk_text, "six");
        assert!(chunks
            .iter()
            .all(|chunk| chunk.chunk_text == chunk.chunk_text.trim()));
    }

    #[test]
    fn whitespace_only_windows_are_skipped() {
        // "ab" + " " + "cd": a one-character window over the separator is empty.
        let pages = [Page::new(0, "ab"), Page::new(1, "cd")];
        let chunks = chunk_pages(&pages, config(1, 0)).expect("valid config");

        let texts = chunks
            .iter()
            .map(|chunk| chunk.chunk_text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
        assert_eq!(chunks[2].page_no, vec![1]);
    }

    #[test]
    fn no_pages_means_no_chunks() {
        let chunks = chunk_pages(&[], ChunkingConfig::default()).expect("valid config");
        assert!(chunks.is_empty());
    }

    #[test]
    fn page_label_is_comma_joined() {
        let chunk = Chunk {
            page_no: vec![2, 3, 7],
            chunk_text: "text".to_string(),
            start: 0,
            end: 4,
        };
        assert_eq!(chunk.page_label(), "2,3,7");
    }
}
