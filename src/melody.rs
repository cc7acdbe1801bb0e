use crate::error::{invalid, EvolveResult};
use float_cmp::{ApproxEq, F64Margin};
use ordered_float::OrderedFloat;
use rand::prelude::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::{max, min};
use std::collections::BTreeSet;

pub type MidiByte = i16;

/// Two bars of 4/4 at 120 BPM, with time values expressed in beats.
pub const MELODY_BEATS: f64 = 8.0;
pub const LOWEST_PIANO_PITCH: MidiByte = 21;
pub const HIGHEST_PIANO_PITCH: MidiByte = 108;
pub const MIN_VELOCITY: MidiByte = 50;
pub const MAX_VELOCITY: MidiByte = 127;

pub fn random_velocity<R: Rng + ?Sized>(rng: &mut R) -> MidiByte {
    rng.gen_range(MIN_VELOCITY..=MAX_VELOCITY)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Note {
    start: OrderedFloat<f64>,
    end: OrderedFloat<f64>,
    pitch: MidiByte,
    velocity: MidiByte,
}

impl ApproxEq for Note {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        let margin = margin.into();
        self.pitch == other.pitch
            && self.velocity == other.velocity
            && self.start.into_inner().approx_eq(other.start.into_inner(), margin)
            && self.end.into_inner().approx_eq(other.end.into_inner(), margin)
    }
}

impl Note {
    pub fn new(start: f64, end: f64, pitch: MidiByte, velocity: MidiByte) -> Self {
        Note {
            start: OrderedFloat(start),
            end: OrderedFloat(end),
            pitch,
            velocity,
        }
    }

    pub fn start(&self) -> f64 {
        self.start.into_inner()
    }

    pub fn end(&self) -> f64 {
        self.end.into_inner()
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    pub fn pitch(&self) -> MidiByte {
        self.pitch
    }

    pub fn velocity(&self) -> MidiByte {
        self.velocity
    }

    pub fn repitched(&self, pitch: MidiByte) -> Note {
        Note { pitch, ..*self }
    }

    pub fn retimed(&self, start: f64, end: f64) -> Note {
        Note {
            start: OrderedFloat(start),
            end: OrderedFloat(end),
            ..*self
        }
    }

    pub fn shifted(&self, offset: f64) -> Note {
        self.retimed(self.start() + offset, self.end() + offset)
    }

    /// Half-open interval overlap: touching notes do not overlap.
    pub fn overlaps(&self, other: &Note) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Melody {
    notes: Vec<Note>,
}

impl From<Vec<Note>> for Melody {
    fn from(notes: Vec<Note>) -> Self {
        Melody { notes }
    }
}

impl Melody {
    pub fn new() -> Self {
        Melody { notes: vec![] }
    }

    pub fn add(&mut self, n: Note) {
        self.notes.push(n);
    }

    pub fn remove(&mut self, index: usize) -> Note {
        self.notes.remove(index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn first_note(&self) -> Option<Note> {
        self.notes.first().copied()
    }

    pub fn last_note(&self) -> Option<Note> {
        self.notes.last().copied()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Note> {
        self.notes.iter_mut()
    }

    /// Stable, so notes sharing a start keep their relative order.
    pub fn sort_by_start(&mut self) {
        self.notes.sort_by_key(|n| n.start);
    }

    pub fn is_sorted_by_start(&self) -> bool {
        self.notes.windows(2).all(|w| w[0].start <= w[1].start)
    }

    pub fn has_overlaps(&self) -> bool {
        (0..self.notes.len())
            .any(|i| (0..i).any(|j| self.notes[i].overlaps(&self.notes[j])))
    }

    pub fn overlaps_any(&self, candidate: &Note) -> bool {
        self.notes.iter().any(|n| n.overlaps(candidate))
    }

    pub fn min_max_pitches(&self) -> Option<(MidiByte, MidiByte)> {
        let first = self.notes.first()?.pitch;
        Some(self.notes.iter().skip(1).fold((first, first), |(lo, hi), n| {
            (min(lo, n.pitch), max(hi, n.pitch))
        }))
    }
}

impl std::ops::IndexMut<usize> for Melody {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.notes[index]
    }
}

impl std::ops::Index<usize> for Melody {
    type Output = Note;

    fn index(&self, index: usize) -> &Self::Output {
        &self.notes[index]
    }
}

/// Every pitch of a key across the piano range, ascending and unique.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Scale {
    pitches: Vec<MidiByte>,
}

impl Scale {
    pub fn new(pitches: Vec<MidiByte>) -> EvolveResult<Self> {
        if pitches.is_empty() {
            return invalid("a scale needs at least one pitch");
        }
        if let Some(p) = pitches
            .iter()
            .find(|p| !(LOWEST_PIANO_PITCH..=HIGHEST_PIANO_PITCH).contains(*p))
        {
            return invalid(format!(
                "pitch {p} lies outside the piano range {LOWEST_PIANO_PITCH}..={HIGHEST_PIANO_PITCH}"
            ));
        }
        if !pitches.windows(2).all(|w| w[0] < w[1]) {
            return invalid("scale pitches must be strictly ascending");
        }
        Ok(Scale { pitches })
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn pitches(&self) -> &[MidiByte] {
        &self.pitches
    }

    pub fn contains(&self, pitch: MidiByte) -> bool {
        self.pitches.binary_search(&pitch).is_ok()
    }

    pub fn random_pitch<R: Rng + ?Sized>(&self, rng: &mut R) -> MidiByte {
        // Construction guarantees at least one pitch.
        self.pitches.choose(rng).copied().unwrap_or(LOWEST_PIANO_PITCH)
    }

    /// Pitch alteration keeps redrawing until the pitch changes, so it
    /// needs a second pitch to land on.
    pub fn require_alternatives(&self) -> EvolveResult<()> {
        if self.pitches.len() < 2 {
            invalid("pitch alteration needs a scale with at least 2 pitches")
        } else {
            Ok(())
        }
    }
}

impl<'de> Deserialize<'de> for Scale {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pitches: BTreeSet<MidiByte> = BTreeSet::deserialize(deserializer)?;
        Scale::new(pitches.into_iter().collect()).map_err(serde::de::Error::custom)
    }
}
