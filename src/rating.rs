use crate::error::{invalid, EvolveResult};
use crate::evolution::{MelodyId, Population};
use crate::melody::{Melody, MidiByte, Note};
use crate::params::{FitnessParameters, Statistic};
use crate::subsequence_finder::{find_motifs, Motif, SeqItem};
use enum_iterator::{all, Sequence};
use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

pub type Ratings = BTreeMap<MelodyId, Rating>;

/// An octave plus a fifth.
pub const EXTREME_JUMP: MidiByte = 17;
const STRONG_BEAT: f64 = 0.5;
const HALF_BEAT: f64 = 0.25;

pub fn round_to_thousandths(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Closeness of `value` to `sweet_spot`: 1 when they coincide, falling off
/// linearly with their distance.
pub fn absolute_rating(value: f64, sweet_spot: f64) -> f64 {
    round_to_thousandths(1.0 - (value - sweet_spot).abs())
}

impl Statistic {
    /// The raw ratio for `melody`, before comparison with a sweet spot.
    pub fn measure(&self, melody: &Melody) -> EvolveResult<f64> {
        if melody.is_empty() {
            return invalid(format!("cannot measure {} of an empty melody", self.name()));
        }
        let notes = melody.notes();
        Ok(match self {
            Statistic::ExtremePitchDifference => extreme_pitch_difference_ratio(notes),
            Statistic::DirectionOfMelody => direction_of_melody(notes),
            Statistic::DirectionalChangesRatio => changes_in_direction_ratio(notes),
            Statistic::OffBeatNotesRatio => off_beat_notes_ratio(notes),
            Statistic::LowestToHighestPitchRatio => lowest_to_highest_pitch_ratio(melody),
            Statistic::UniquePitchRatio => unique_pitch_ratio(notes),
            Statistic::ConsecutivePitchesRatio => consecutive_pitches_ratio(notes),
            Statistic::UniqueRhythmRatio => unique_rhythm_ratio(notes),
        })
    }
}

// The count ratios below all divide by the number of notes, not by the
// number of neighboring pairs.

fn count_ratio<P: Fn(&Note, &Note) -> bool>(notes: &[Note], pair_test: P) -> f64 {
    let count = notes.windows(2).filter(|w| pair_test(&w[0], &w[1])).count();
    count as f64 / notes.len() as f64
}

fn extreme_pitch_difference_ratio(notes: &[Note]) -> f64 {
    count_ratio(notes, |a, b| (b.pitch() - a.pitch()).abs() > EXTREME_JUMP)
}

fn direction_of_melody(notes: &[Note]) -> f64 {
    count_ratio(notes, |a, b| b.pitch() > a.pitch())
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Direction {
    Up,
    Down,
}

fn changes_in_direction_ratio(notes: &[Note]) -> f64 {
    let mut changes = 0;
    let mut current: Option<Direction> = None;
    for i in 1..notes.len() {
        let step = notes[i].pitch() - notes[i - 1].pitch();
        let heading = if step > 0 {
            Some(Direction::Up)
        } else if step < 0 {
            Some(Direction::Down)
        } else {
            None
        };
        if heading.is_some() && heading != current {
            current = heading;
            // The first step only establishes a direction.
            if i != 1 {
                changes += 1;
            }
        }
    }
    changes as f64 / notes.len() as f64
}

fn off_beat_notes_ratio(notes: &[Note]) -> f64 {
    let off_beat = notes
        .iter()
        .filter(|n| n.start() % STRONG_BEAT != 0.0 && n.start() % HALF_BEAT != 0.0)
        .count();
    off_beat as f64 / notes.len() as f64
}

fn lowest_to_highest_pitch_ratio(melody: &Melody) -> f64 {
    match melody.min_max_pitches() {
        Some((lo, hi)) if hi > 0 => lo as f64 / hi as f64,
        _ => 1.0,
    }
}

fn unique_pitch_ratio(notes: &[Note]) -> f64 {
    let pitches = notes.iter().map(|n| n.pitch()).collect::<HashSet<_>>();
    pitches.len() as f64 / notes.len() as f64
}

fn consecutive_pitches_ratio(notes: &[Note]) -> f64 {
    count_ratio(notes, |a, b| a.pitch() == b.pitch())
}

fn unique_rhythm_ratio(notes: &[Note]) -> f64 {
    let rhythms = notes
        .iter()
        .map(|n| OrderedFloat(n.duration()))
        .collect::<HashSet<_>>();
    rhythms.len() as f64 / notes.len() as f64
}

/// The three views of a melody that motif detection searches.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Sequence)]
pub enum Projection {
    PitchIntervals,
    Durations,
    Pauses,
}

impl Projection {
    pub fn name(&self) -> &'static str {
        match self {
            Projection::PitchIntervals => "pitchIntervalMotifs",
            Projection::Durations => "durationMotifs",
            Projection::Pauses => "pauseMotifs",
        }
    }

    /// Repeated pitch patterns count for more than repeated rhythms.
    pub fn weight(&self) -> f64 {
        match self {
            Projection::PitchIntervals => 3.0,
            Projection::Durations | Projection::Pauses => 2.0,
        }
    }

    pub fn project(&self, melody: &Melody) -> Vec<OrderedFloat<f64>> {
        let notes = melody.notes();
        match self {
            Projection::PitchIntervals => notes
                .windows(2)
                .map(|w| OrderedFloat(f64::from(w[1].pitch() - w[0].pitch())))
                .collect(),
            Projection::Durations => notes
                .iter()
                .map(|n| OrderedFloat(round_to_thousandths(n.duration())))
                .collect(),
            Projection::Pauses => notes
                .windows(2)
                .map(|w| OrderedFloat(round_to_thousandths(w[1].start() - w[0].end())))
                .collect(),
        }
    }

    /// Weighted motif score of `melody` under this projection.
    pub fn score(&self, melody: &Melody) -> f64 {
        let motifs = find_motifs(&self.project(melody));
        score_motifs(&motifs, melody.len(), *self) * self.weight()
    }

    /// Motif patterns measure intervals, so a pitch pattern spans one more
    /// note than it has values.
    fn notes_spanned(&self, pattern_len: usize) -> usize {
        match self {
            Projection::PitchIntervals => pattern_len + 1,
            Projection::Durations | Projection::Pauses => pattern_len,
        }
    }
}

/// Share of the melody covered by one occurrence of its longest motif,
/// doubled so that a melody made of one motif played twice scores 1.
pub fn score_motifs<T: SeqItem>(motifs: &[Motif<T>], total_notes: usize, projection: Projection) -> f64 {
    let Some(first) = motifs.first() else {
        return 0.0;
    };
    if total_notes == 0 {
        return 0.0;
    }
    let mut largest = first;
    for motif in motifs.iter().skip(1) {
        if motif.len() > largest.len() {
            largest = motif;
        }
    }
    if largest.positions_consecutive() {
        return 0.0;
    }
    let spanned = projection.notes_spanned(largest.len());
    round_to_thousandths(spanned as f64 / total_notes as f64 * 2.0)
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Criterion {
    Statistic(Statistic),
    Motif(Projection),
}

impl Criterion {
    pub fn all() -> Vec<Criterion> {
        all::<Statistic>()
            .map(Criterion::Statistic)
            .chain(all::<Projection>().map(Criterion::Motif))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Statistic(s) => s.name(),
            Criterion::Motif(p) => p.name(),
        }
    }
}

/// Scores for every criterion of one melody. Summing them is left to the
/// caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rating {
    scores: BTreeMap<Criterion, f64>,
}

impl FromIterator<(Criterion, f64)> for Rating {
    fn from_iter<I: IntoIterator<Item = (Criterion, f64)>>(iter: I) -> Self {
        Rating {
            scores: iter.into_iter().collect(),
        }
    }
}

impl Rating {
    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.scores.get(&criterion).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Criterion, &f64)> {
        self.scores.iter()
    }

    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.scores.iter().map(|(c, v)| (c.name(), v)))
    }
}

pub fn rate_melody(melody: &Melody, params: &FitnessParameters) -> EvolveResult<Rating> {
    let mut scores = BTreeMap::new();
    for statistic in all::<Statistic>() {
        let value = statistic.measure(melody)?;
        scores.insert(
            Criterion::Statistic(statistic),
            absolute_rating(value, params.sweet_spot(statistic)),
        );
    }
    for projection in all::<Projection>() {
        scores.insert(Criterion::Motif(projection), projection.score(melody));
    }
    Ok(Rating { scores })
}

pub fn rate_melodies(population: &Population, params: &FitnessParameters) -> EvolveResult<Ratings> {
    let ratings = population
        .iter()
        .map(|(id, melody)| rate_melody(melody, params).map(|r| (*id, r)))
        .collect::<EvolveResult<Ratings>>()?;
    log::debug!("rated {} melodies", ratings.len());
    Ok(ratings)
}
