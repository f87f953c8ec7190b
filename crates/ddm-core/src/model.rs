//! Core data model: `Download`, `Chunk`, and the shared state enum.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state shared by `Download` and `Chunk`.
///
/// The on-disk, in-memory, and wire encodings are bit-exact with the:
/// `0 = Active, 1 = Paused, 2 = Cancelled, 3 = Completed`. `Serialize`/
/// `Deserialize` are hand-written (rather than derived) so that JSON event
/// payloads carry the same integer code as the SQLite columns,
/// instead of serde's default variant-name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum State {
    Active = 0,
    Paused = 1,
    Cancelled = 2,
    Completed = 3,
}

impl State {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => State::Active,
            1 => State::Paused,
            2 => State::Cancelled,
            3 => State::Completed,
            other => panic!("invalid state code: {other}"),
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Cancelled | State::Completed)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i64::deserialize(deserializer)?;
        match v {
            0..=3 => Ok(State::from_i64(v)),
            other => Err(serde::de::Error::custom(format!("invalid state code: {other}"))),
        }
    }
}

/// One byte-range of a `Download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: i64,
    pub download_id: i64,
    pub index: i64,
    pub start_byte: i64,
    pub end_byte: i64,
    pub written: i64,
    pub state: State,
}

impl Chunk {
    /// Size of this chunk's byte range, inclusive on both ends.
    pub fn len(&self) -> i64 {
        self.end_byte - self.start_byte + 1
    }

    /// True once `written` covers the whole range.
    pub fn is_fully_written(&self) -> bool {
        self.written >= self.len()
    }

    pub fn part_file_name(index: i64) -> String {
        format!(".part-{index}")
    }
}

/// A logical file transfer.
#[derive(Debug, Clone)]
pub struct Download {
    pub id: i64,
    pub url: String,
    pub target_path: String,
    pub total_size: i64,
    pub chunk_count: i64,
    pub worker_count: i64,
    pub state: State,
    pub completed_chunks: i64,
    pub chunks: Vec<Chunk>,
}

impl Download {
    /// Completed iff every chunk is Completed.
    pub fn all_chunks_completed(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.state == State::Completed)
    }

    pub fn part_path(&self, index: i64) -> String {
        format!("{}{}", self.target_path, Chunk::part_file_name(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_are_bit_exact_with_spec_6_1() {
        assert_eq!(State::Active.as_i64(), 0);
        assert_eq!(State::Paused.as_i64(), 1);
        assert_eq!(State::Cancelled.as_i64(), 2);
        assert_eq!(State::Completed.as_i64(), 3);
    }

    #[test]
    fn state_json_encoding_is_the_integer_code() {
        assert_eq!(serde_json::to_string(&State::Paused).unwrap(), "1");
        let decoded: State = serde_json::from_str("2").unwrap();
        assert_eq!(decoded, State::Cancelled);
    }

    #[test]
    #[should_panic(expected = "invalid state code")]
    fn from_i64_panics_on_unknown_code() {
        State::from_i64(9);
    }

    #[test]
    fn chunk_is_fully_written_at_exact_boundary() {
        let chunk = Chunk {
            id: 1,
            download_id: 1,
            index: 0,
            start_byte: 0,
            end_byte: 9,
            written: 10,
            state: State::Active,
        };
        assert_eq!(chunk.len(), 10);
        assert!(chunk.is_fully_written());
    }
}
