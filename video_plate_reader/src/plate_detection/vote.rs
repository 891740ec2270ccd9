use std::collections::HashMap;

use crate::error::PlateError;

#[derive(Debug, Clone, Copy)]
struct Count {
    votes: usize,
    first_seen: u64,
}

/// Occurrence count of each plate reading across one video.
///
/// Blank readings are never stored. Ties between equally frequent readings go
/// to the one whose first vote came from the earliest frame, which keeps the
/// winner independent of task completion order.
#[derive(Debug, Default, Clone)]
pub struct VoteTally {
    counts: HashMap<String, Count>,
    total: usize,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one reading from the frame at `frame_index`. Returns false and
    /// records nothing for blank text.
    pub fn record(&mut self, text: &str, frame_index: u64) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.counts
            .entry(text.to_string())
            .and_modify(|count| {
                count.votes += 1;
                count.first_seen = count.first_seen.min(frame_index);
            })
            .or_insert(Count {
                votes: 1,
                first_seen: frame_index,
            });
        self.total += 1;
        true
    }

    pub fn total_votes(&self) -> usize {
        self.total
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn votes_for(&self, text: &str) -> usize {
        self.counts.get(text).map(|count| count.votes).unwrap_or(0)
    }

    /// The most frequent reading, or `NoPlateDetected` for an empty tally.
    pub fn winner(&self) -> Result<&str, PlateError> {
        self.counts
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.votes
                    .cmp(&b.votes)
                    .then_with(|| b.first_seen.cmp(&a.first_seen))
            })
            .map(|(text, _)| text.as_str())
            .ok_or(PlateError::NoPlateDetected)
    }
}

impl<S: AsRef<str>> FromIterator<S> for VoteTally {
    /// Builds a tally where each reading's position stands in for its frame.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tally = VoteTally::new();
        for (position, text) in iter.into_iter().enumerate() {
            tally.record(text.as_ref(), position as u64);
        }
        tally
    }
}
