//! Caption timing from speech-recognition segments.
//!
//! The recognizer only reports segment-level timing, so each segment's
//! duration is split evenly across its words. The transcript is packed into
//! short chunks and each chunk takes the end time of the word its running
//! character offset lands on.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use vgen_models::{
    CaptionChunk, IssueObserver, StageIssue, TimeInterval, TracingObserver, TranscriptSegment,
};

/// Default maximum caption length in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 15;

/// Characters kept in caption text: word characters, whitespace, hyphen and quotes.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[^\w\s\-"']"#).unwrap());

/// Estimated end time for each half-open character range `[lo, hi)` of
/// the word-joined segment text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharTimestampMap {
    entries: Vec<(usize, usize, f64)>,
}

impl CharTimestampMap {
    /// Build the map from recognizer segments.
    ///
    /// Offsets run across segment boundaries as if every word were joined
    /// with a single space.
    pub fn build(segments: &[TranscriptSegment]) -> Self {
        let mut entries = Vec::new();
        let mut offset = 0usize;

        for segment in segments {
            let words: Vec<&str> = segment.text.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            let start = segment.interval.start();
            let per_word = segment.interval.duration() / words.len() as f64;

            for (i, word) in words.iter().enumerate() {
                let next = offset + word.chars().count() + 1;
                entries.push((offset, next, start + (i + 1) as f64 * per_word));
                offset = next;
            }
        }

        Self { entries }
    }

    /// End time of the first range containing `offset`.
    ///
    /// Both bounds are inclusive, so an offset sitting exactly on a word
    /// boundary resolves to the earlier word.
    pub fn lookup(&self, offset: usize) -> Option<f64> {
        self.entries
            .iter()
            .find(|(lo, hi, _)| *lo <= offset && offset <= *hi)
            .map(|(_, _, t)| *t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps transcript text onto recognizer timing as a list of captions.
#[derive(Debug, Clone, Copy)]
pub struct CaptionAligner {
    max_chunk_size: usize,
}

impl Default for CaptionAligner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}

impl CaptionAligner {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Align captions, logging dropped chunks.
    pub fn align(&self, transcript: &str, segments: &[TranscriptSegment]) -> Vec<CaptionChunk> {
        self.align_observed(transcript, segments, &TracingObserver)
    }

    /// Align captions, reporting every dropped chunk as an
    /// [`StageIssue::AlignmentGap`].
    ///
    /// The first caption starts at 0 and each following caption starts where
    /// the previous one ended. Empty input yields no captions.
    pub fn align_observed(
        &self,
        transcript: &str,
        segments: &[TranscriptSegment],
        observer: &dyn IssueObserver,
    ) -> Vec<CaptionChunk> {
        if transcript.trim().is_empty() || segments.is_empty() {
            return Vec::new();
        }

        let map = CharTimestampMap::build(segments);
        let words: Vec<&str> = transcript.split_whitespace().collect();
        let chunks = self.pack_words(&words);

        let mut captions = Vec::with_capacity(chunks.len());
        let mut offset = 0usize;
        let mut previous_end = 0.0f64;

        for chunk in chunks {
            offset += chunk.chars().count() + 1;
            let text = clean_chunk(&chunk);

            match map.lookup(offset) {
                Some(end) if !text.is_empty() => {
                    let end = end.max(previous_end);
                    captions.push(CaptionChunk::new(
                        TimeInterval::ordered(previous_end, end),
                        text,
                    ));
                    previous_end = end;
                }
                Some(_) => {}
                None => observer.observe(StageIssue::AlignmentGap {
                    chunk: text,
                    offset,
                }),
            }
        }

        debug!(
            words = words.len(),
            captions = captions.len(),
            map_entries = map.len(),
            "Aligned captions"
        );

        captions
    }

    /// Greedy packer. A chunk keeps growing while it fits, but stops at the
    /// first word that takes it to half the limit or more. A single word
    /// longer than the limit becomes its own chunk.
    pub fn pack_words(&self, words: &[&str]) -> Vec<String> {
        let half = self.max_chunk_size as f64 / 2.0;
        let mut chunks = Vec::new();
        let mut rest = words.iter().copied().peekable();

        while let Some(first) = rest.next() {
            let mut chunk = first.to_string();
            let mut len = first.chars().count();

            while let Some(next) = rest.peek() {
                let next_len = next.chars().count();
                if len + 1 + next_len > self.max_chunk_size {
                    break;
                }
                chunk.push(' ');
                chunk.push_str(next);
                len += 1 + next_len;
                rest.next();
                if len as f64 >= half {
                    break;
                }
            }
            chunks.push(chunk);
        }

        chunks
    }
}

fn clean_chunk(chunk: &str) -> String {
    UNSAFE_CHARS.replace_all(chunk, "").into_owned()
}
