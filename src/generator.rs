use crate::melody::{random_velocity, Melody, MidiByte, Note, Scale, MELODY_BEATS};
use rand::prelude::SliceRandom;
use rand::Rng;

pub const MIN_GENERATED_NOTES: usize = 4;
pub const MAX_GENERATED_NOTES: usize = 64;
pub const NOTE_LENGTHS: [f64; 3] = [1.0, 0.5, 0.25];
/// Zero appears twice so that back-to-back notes are the likeliest outcome.
pub const SILENCE_LENGTHS: [f64; 6] = [0.0, 0.0, 1.0, 0.5, 0.25, 0.125];
const MAX_LENGTH_DISTANCE: f64 = 1.0;

/// Creates a random melody in `scale`. Notes are laid out back to back with
/// optional silences, and generation stops as soon as the next note plus its
/// trailing silence would run past the end of the melody window.
pub fn generate_melody<R: Rng + ?Sized>(scale: &Scale, rng: &mut R) -> Melody {
    let target_notes = rng.gen_range(MIN_GENERATED_NOTES..=MAX_GENERATED_NOTES);
    let mut previous_length = *NOTE_LENGTHS.choose(rng).unwrap_or(&NOTE_LENGTHS[0]);
    let mut previous_pitch = scale.random_pitch(rng);
    let mut start = 0.0;
    let mut melody = Melody::new();
    for _ in 0..target_notes {
        let pitch = select_pitch(previous_pitch, scale, rng);
        let velocity = random_velocity(rng);
        let length = select_length(previous_length, &NOTE_LENGTHS, rng);
        let silence = select_length(length, &SILENCE_LENGTHS, rng);
        if start + length + silence > MELODY_BEATS {
            break;
        }
        melody.add(Note::new(start, start + length, pitch, velocity));
        start += length + silence;
        previous_length = length;
        previous_pitch = pitch;
    }
    log::trace!("generated {} of {target_notes} notes", melody.len());
    melody
}

/// Picks uniformly among the `candidates` within `MAX_LENGTH_DISTANCE` of
/// `previous`. With the stock length tables every candidate qualifies.
pub fn select_length<R: Rng + ?Sized>(previous: f64, candidates: &[f64], rng: &mut R) -> f64 {
    let favored = candidates
        .iter()
        .copied()
        .filter(|length| (length - previous).abs() <= MAX_LENGTH_DISTANCE)
        .collect::<Vec<_>>();
    favored.choose(rng).copied().unwrap_or(previous)
}

/// Picks uniformly among the scale pitches other than `previous`. Falls back
/// to `previous` when the scale offers nothing else.
pub fn select_pitch<R: Rng + ?Sized>(previous: MidiByte, scale: &Scale, rng: &mut R) -> MidiByte {
    let favored = scale
        .pitches()
        .iter()
        .copied()
        .filter(|pitch| *pitch != previous)
        .collect::<Vec<_>>();
    favored.choose(rng).copied().unwrap_or(previous)
}
