use std::fmt::Debug;
use trait_set::trait_set;
use vecmap::VecMap;

trait_set! {
    pub trait SeqItem = Eq + PartialEq + Debug + Copy + Clone;
}

pub const MIN_MOTIF_LEN: usize = 2;

/// A pattern of values that recurs in a sequence, along with the ascending
/// offsets where it starts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Motif<T: SeqItem> {
    positions: Vec<usize>,
    pattern: Vec<T>,
}

impl<T: SeqItem> Motif<T> {
    pub fn new(positions: Vec<usize>, pattern: Vec<T>) -> Self {
        Motif { positions, pattern }
    }

    pub fn positions(&self) -> &Vec<usize> {
        &self.positions
    }

    pub fn pattern(&self) -> &Vec<T> {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    /// True when every position follows its predecessor by exactly one.
    /// Such a motif is a run of one value seen from adjacent offsets, not
    /// a genuine repetition.
    pub fn positions_consecutive(&self) -> bool {
        self.positions.windows(2).all(|w| w[1] == w[0] + 1)
    }

    fn contains(&self, other: &Motif<T>) -> bool {
        other.pattern.is_empty()
            || (other.len() <= self.len()
                && self
                    .pattern
                    .windows(other.len())
                    .any(|w| w == other.pattern.as_slice()))
    }
}

/// Groups every contiguous window of at least `MIN_MOTIF_LEN` items by
/// content. Buckets appear in discovery order: shorter windows first, then
/// by offset.
pub fn motif_buckets<T: SeqItem>(items: &[T]) -> VecMap<Vec<T>, Vec<usize>> {
    let mut value2starts: VecMap<Vec<T>, Vec<usize>> = VecMap::new();
    for length in MIN_MOTIF_LEN..=items.len() {
        for i in 0..=items.len() - length {
            let sub: Vec<T> = items[i..i + length].to_vec();
            match value2starts.get_mut(&sub) {
                None => {
                    value2starts.insert(sub, vec![i]);
                }
                Some(starts) => {
                    starts.push(i);
                }
            }
        }
    }
    value2starts
}

/// Keeps the buckets found at more than one offset.
pub fn repeated<T: SeqItem>(mut buckets: VecMap<Vec<T>, Vec<usize>>) -> Vec<Motif<T>> {
    buckets
        .drain(..)
        .filter(|(_, starts)| starts.len() > 1)
        .map(|(pattern, positions)| Motif { positions, pattern })
        .collect()
}

/// Orders motifs longest first (stable, so equal lengths keep discovery
/// order), drops every motif contained in an earlier one, then drops motifs
/// whose positions are all consecutive.
pub fn post_process<T: SeqItem>(mut motifs: Vec<Motif<T>>) -> Vec<Motif<T>> {
    motifs.sort_by(|a, b| b.len().cmp(&a.len()));
    let mut kept: Vec<Motif<T>> = vec![];
    for motif in motifs {
        if !kept.iter().any(|k| k.contains(&motif)) {
            kept.push(motif);
        }
    }
    kept.retain(|m| !m.positions_consecutive());
    kept
}

pub fn find_motifs<T: SeqItem>(items: &[T]) -> Vec<Motif<T>> {
    post_process(repeated(motif_buckets(items)))
}
