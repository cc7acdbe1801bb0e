use crate::error::{check_unit_interval, EvolveResult};
use crate::evolution::Population;
use crate::generator::{select_length, select_pitch, NOTE_LENGTHS};
use crate::melody::{random_velocity, Melody, Note, Scale, MELODY_BEATS};
use crate::params::MutationParameters;
use rand::prelude::SliceRandom;
use rand::Rng;

pub const CHILDREN_PER_PARENT: usize = 5;
/// Spacing of the start times a moved note may land on.
pub const MOVE_GRID: f64 = 0.125;
const MOVE_GRID_STEPS: usize = (MELODY_BEATS / MOVE_GRID) as usize;
/// A note that cannot move is halved, but never below this length.
pub const SHORTEST_HALVABLE: f64 = 0.125;
pub const COPY_PASTE_SPAN: f64 = 0.5;
pub const COPY_PASTE_SPANS: usize = 8;
const REMOVE_SHARE: f64 = 0.25;
const MIN_NOTES_AFTER_REMOVAL: usize = 4;
const ADDED_NOTE_PREVIOUS_LENGTH: f64 = 1.0;

/// Expands `parents` into `CHILDREN_PER_PARENT` children each. Children are
/// produced in rounds, one per parent per round, and numbered from 1.
pub fn mutate<R: Rng + ?Sized>(
    parents: &Population,
    scale: &Scale,
    params: &MutationParameters,
    rng: &mut R,
) -> EvolveResult<Population> {
    let mut children = Population::new();
    let mut next_id = 1;
    for _ in 0..CHILDREN_PER_PARENT {
        for melody in parents.values() {
            let child = mutate_alter_pitches(melody, scale, params.alter_pitches(), rng)?;
            let child = mutate_move_notes(&child, params.move_notes(), rng)?;
            let child = mutate_copy_paste_beats(&child, params.copy_paste_beat(), rng)?;
            let child = mutate_add_or_remove_notes(&child, scale, params.add_or_remove_notes(), rng)?;
            children.insert(next_id, child);
            next_id += 1;
        }
    }
    log::debug!("mutated {} parents into {} children", parents.len(), children.len());
    Ok(children)
}

/// Each note, with probability `probability`, takes a different pitch drawn
/// uniformly from `scale`.
pub fn mutate_alter_pitches<R: Rng + ?Sized>(
    melody: &Melody,
    scale: &Scale,
    probability: f64,
    rng: &mut R,
) -> EvolveResult<Melody> {
    check_unit_interval(probability, "alterPitchesProbability")?;
    scale.require_alternatives()?;
    let mut result = melody.clone();
    for note in result.iter_mut() {
        if rng.gen::<f64>() < probability {
            let mut pitch = scale.random_pitch(rng);
            while pitch == note.pitch() {
                pitch = scale.random_pitch(rng);
            }
            *note = note.repitched(pitch);
        }
    }
    Ok(result)
}

/// Each note, with probability `probability`, moves to a random free grid
/// position that keeps its duration. A note whose only free position is its
/// own stays put. A note with no free position at all is halved instead,
/// unless it is already at `SHORTEST_HALVABLE`.
pub fn mutate_move_notes<R: Rng + ?Sized>(
    melody: &Melody,
    probability: f64,
    rng: &mut R,
) -> EvolveResult<Melody> {
    check_unit_interval(probability, "moveNotesProbability")?;
    let mut result = melody.clone();
    for i in 0..result.len() {
        if rng.gen::<f64>() < probability {
            let note = result[i];
            let duration = note.duration();
            let legal = (0..=MOVE_GRID_STEPS)
                .map(|step| step as f64 * MOVE_GRID)
                .filter(|t| can_place(&result, i, *t, duration))
                .collect::<Vec<_>>();
            let elsewhere = legal
                .iter()
                .copied()
                .filter(|t| *t != note.start())
                .collect::<Vec<_>>();
            if let Some(t) = elsewhere.choose(rng) {
                result[i] = note.retimed(*t, *t + duration);
            } else if legal.is_empty() && duration > SHORTEST_HALVABLE {
                log::trace!("no room for note {i}; halving it");
                result[i] = note.retimed(note.start(), note.start() + duration / 2.0);
            }
        }
    }
    result.sort_by_start();
    Ok(result)
}

fn can_place(melody: &Melody, moving: usize, start: f64, duration: f64) -> bool {
    let end = start + duration;
    end <= MELODY_BEATS
        && melody
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != moving)
            .all(|(_, other)| !blocks(start, end, other))
}

fn blocks(start: f64, end: f64, other: &Note) -> bool {
    (start >= other.start() && start < other.end())
        || (end > other.start() && end <= other.end())
        || (start <= other.start() && end >= other.end())
}

/// With probability `probability`, moves whatever sounds during one
/// `COPY_PASTE_SPAN` onto a different one. The spans are the first
/// `COPY_PASTE_SPANS` half-beats of the melody. Notes crossing a span edge
/// are cut at that edge: only the inside part travels, and only the outside
/// parts remain at the source and at the destination.
pub fn mutate_copy_paste_beats<R: Rng + ?Sized>(
    melody: &Melody,
    probability: f64,
    rng: &mut R,
) -> EvolveResult<Melody> {
    check_unit_interval(probability, "copyPasteBeatProbability")?;
    if rng.gen::<f64>() >= probability {
        return Ok(melody.clone());
    }
    let source = rng.gen_range(0..COPY_PASTE_SPANS);
    let mut target = rng.gen_range(0..COPY_PASTE_SPANS - 1);
    if target >= source {
        target += 1;
    }
    Ok(paste_span(melody, source, target))
}

/// Lifts the contents of span `source` out of `melody`, clears span
/// `target`, and drops the lifted fragments into it.
fn paste_span(melody: &Melody, source: usize, target: usize) -> Melody {
    let (source_start, source_end) = span_bounds(source);
    let (target_start, target_end) = span_bounds(target);
    let shift = target_start - source_start;
    let fragments = melody
        .iter()
        .filter_map(|n| clipped(n, source_start, source_end))
        .map(|n| n.shifted(shift))
        .collect::<Vec<_>>();
    log::trace!(
        "moving {} fragments from span {source} to span {target}",
        fragments.len()
    );
    let lifted = cleared(melody, source_start, source_end);
    let mut result = cleared(&lifted, target_start, target_end);
    for fragment in fragments {
        result.add(fragment);
    }
    result.sort_by_start();
    result
}

fn span_bounds(span: usize) -> (f64, f64) {
    let start = span as f64 * COPY_PASTE_SPAN;
    (start, start + COPY_PASTE_SPAN)
}

fn clipped(note: &Note, lo: f64, hi: f64) -> Option<Note> {
    let start = note.start().max(lo);
    let end = note.end().min(hi);
    if start < end {
        Some(note.retimed(start, end))
    } else {
        None
    }
}

fn cleared(melody: &Melody, lo: f64, hi: f64) -> Melody {
    let mut result = Melody::new();
    for note in melody.iter() {
        if note.end() <= lo || note.start() >= hi {
            result.add(*note);
        } else {
            if note.start() < lo {
                result.add(note.retimed(note.start(), lo));
            }
            if note.end() > hi {
                result.add(note.retimed(hi, note.end()));
            }
        }
    }
    result
}

/// With probability `probability`, either tries to add one note (three times
/// in four) or removes a random note from melodies longer than four notes.
/// An added note that would overlap an existing one is dropped.
pub fn mutate_add_or_remove_notes<R: Rng + ?Sized>(
    melody: &Melody,
    scale: &Scale,
    probability: f64,
    rng: &mut R,
) -> EvolveResult<Melody> {
    check_unit_interval(probability, "addOrRemoveNotesProbability")?;
    let mut result = melody.clone();
    if rng.gen::<f64>() < probability {
        if rng.gen::<f64>() >= REMOVE_SHARE {
            let length = select_length(ADDED_NOTE_PREVIOUS_LENGTH, &NOTE_LENGTHS, rng);
            let start = rng.gen::<f64>() * (MELODY_BEATS - length);
            let previous_pitch = match result
                .iter()
                .rev()
                .find(|n| n.end() <= start)
                .copied()
                .or(result.first_note())
            {
                Some(n) => n.pitch(),
                None => scale.random_pitch(rng),
            };
            let pitch = select_pitch(previous_pitch, scale, rng);
            let note = Note::new(start, start + length, pitch, random_velocity(rng));
            if result.overlaps_any(&note) {
                log::trace!("dropping added note at {start}: no room");
            } else {
                result.add(note);
                result.sort_by_start();
            }
        } else if result.len() > MIN_NOTES_AFTER_REMOVAL {
            let doomed = rng.gen_range(0..result.len());
            result.remove(doomed);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_melody;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NUM_RANDOM_TESTS: usize = 100;

    fn scale() -> Scale {
        Scale::new(vec![60, 62, 64, 65, 67, 69, 71]).unwrap()
    }

    fn four_whole_notes() -> Melody {
        Melody::from(vec![
            Note::new(0.0, 1.0, 60, 100),
            Note::new(1.0, 2.0, 62, 100),
            Note::new(2.0, 3.0, 64, 100),
            Note::new(3.0, 4.0, 65, 100),
        ])
    }

    fn well_formed(melody: &Melody) -> bool {
        melody.is_sorted_by_start()
            && !melody.has_overlaps()
            && melody
                .iter()
                .all(|n| n.start() >= 0.0 && n.end() > n.start() && n.end() <= MELODY_BEATS)
    }

    #[test]
    fn test_mutate_child_count_and_ids() {
        let mut parents = Population::new();
        parents.insert(1, four_whole_notes());
        parents.insert(2, Melody::from(vec![
            Note::new(0.0, 0.5, 62, 90),
            Note::new(0.5, 1.0, 65, 90),
            Note::new(1.0, 1.5, 60, 90),
            Note::new(1.5, 2.0, 69, 90),
        ]));
        let params = MutationParameters::new(0.5, 0.5, 0.5, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(10);
        let children = mutate(&parents, &scale(), &params, &mut rng).unwrap();
        assert_eq!(children.len(), 10);
        assert_eq!(children.keys().copied().collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
        assert!(children.values().all(well_formed));
        assert_eq!(parents[&1], four_whole_notes());
    }

    #[test]
    fn test_mutate_three_parents() {
        let mut parents = Population::new();
        for id in [4, 7, 9] {
            parents.insert(id, four_whole_notes());
        }
        let mut rng = StdRng::seed_from_u64(11);
        let children = mutate(&parents, &scale(), &MutationParameters::default(), &mut rng).unwrap();
        assert_eq!(children.len(), 15);
        assert_eq!(*children.keys().last().unwrap(), 15);
    }

    #[test]
    fn test_mutate_empty_parents() {
        let mut rng = StdRng::seed_from_u64(12);
        let children = mutate(&Population::new(), &scale(), &MutationParameters::default(), &mut rng).unwrap();
        assert!(children.is_empty());
    }

    #[test]
    fn test_mutate_rejects_single_pitch_scale() {
        let mut parents = Population::new();
        parents.insert(1, four_whole_notes());
        let lonely = Scale::new(vec![60]).unwrap();
        let mut rng = StdRng::seed_from_u64(13);
        assert!(mutate(&parents, &lonely, &MutationParameters::default(), &mut rng).is_err());
    }

    #[test]
    fn test_alter_pitches_always() {
        let original = four_whole_notes();
        let mut rng = StdRng::seed_from_u64(14);
        for _ in 0..NUM_RANDOM_TESTS {
            let altered = mutate_alter_pitches(&original, &scale(), 1.0, &mut rng).unwrap();
            for (before, after) in original.iter().zip(altered.iter()) {
                assert_ne!(before.pitch(), after.pitch());
                assert!(scale().contains(after.pitch()));
                assert_eq!(before.start(), after.start());
                assert_eq!(before.end(), after.end());
            }
        }
    }

    #[test]
    fn test_alter_pitches_never() {
        let original = four_whole_notes();
        let mut rng = StdRng::seed_from_u64(15);
        assert_eq!(mutate_alter_pitches(&original, &scale(), 0.0, &mut rng).unwrap(), original);
        assert!(mutate_alter_pitches(&original, &scale(), 1.5, &mut rng).is_err());
    }

    #[test]
    fn test_move_notes_always() {
        let original = Melody::from(vec![
            Note::new(0.0, 0.125, 60, 100),
            Note::new(10.0, 10.125, 62, 100),
        ]);
        let mut rng = StdRng::seed_from_u64(16);
        for _ in 0..NUM_RANDOM_TESTS {
            let moved = mutate_move_notes(&original, 1.0, &mut rng).unwrap();
            assert_eq!(moved.len(), 2);
            assert!(well_formed(&moved));
            for before in original.iter() {
                let after = moved.iter().find(|n| n.pitch() == before.pitch()).unwrap();
                assert_eq!(after.duration(), before.duration());
                assert_ne!(after.start(), before.start());
            }
        }
    }

    #[test]
    fn test_move_notes_never() {
        let original = four_whole_notes();
        let mut rng = StdRng::seed_from_u64(17);
        assert_eq!(mutate_move_notes(&original, 0.0, &mut rng).unwrap(), original);
    }

    #[test]
    fn test_move_keeps_boxed_in_notes() {
        let full = Melody::from(
            (0..8)
                .map(|i| Note::new(i as f64, i as f64 + 1.0, 60 + i as i16, 100))
                .collect::<Vec<_>>(),
        );
        let mut rng = StdRng::seed_from_u64(18);
        for _ in 0..NUM_RANDOM_TESTS {
            // Each note's own slot is the only one free.
            assert_eq!(mutate_move_notes(&full, 1.0, &mut rng).unwrap(), full);
        }
    }

    #[test]
    fn test_move_halves_when_nothing_fits() {
        let cramped = Melody::from(vec![
            Note::new(0.0, 7.5, 60, 100),
            Note::new(7.5, 8.5, 62, 100),
        ]);
        let mut rng = StdRng::seed_from_u64(19);
        let moved = mutate_move_notes(&cramped, 1.0, &mut rng).unwrap();
        assert_eq!(moved.notes(), &[cramped[0], Note::new(7.5, 8.0, 62, 100)]);
    }

    #[test]
    fn test_move_leaves_shortest_notes_alone() {
        let tiny = Note::new(8.0, 8.125, 60, 100);
        let cramped = Melody::from(vec![Note::new(0.0, 8.0, 62, 100), tiny]);
        let mut rng = StdRng::seed_from_u64(19);
        assert_eq!(mutate_move_notes(&cramped, 1.0, &mut rng).unwrap(), cramped);
    }

    #[test]
    fn test_copy_paste_always() {
        let original = Melody::from(vec![
            Note::new(0.0, 1.0, 60, 100),
            Note::new(1.0, 2.0, 62, 100),
            Note::new(2.0, 3.0, 64, 100),
            Note::new(3.0, 4.0, 65, 100),
        ]);
        let mut rng = StdRng::seed_from_u64(20);
        for _ in 0..NUM_RANDOM_TESTS {
            let pasted = mutate_copy_paste_beats(&original, 1.0, &mut rng).unwrap();
            assert_ne!(pasted, original);
            assert!(well_formed(&pasted));
        }
    }

    #[test]
    fn test_copy_paste_never() {
        let original = four_whole_notes();
        let mut rng = StdRng::seed_from_u64(21);
        assert_eq!(mutate_copy_paste_beats(&original, 0.0, &mut rng).unwrap(), original);
    }

    #[test]
    fn test_paste_span_moves_fragments() {
        let melody = Melody::from(vec![
            Note::new(0.25, 0.75, 60, 100),
            Note::new(0.75, 1.25, 62, 100),
            Note::new(1.5, 2.0, 64, 100),
        ]);
        // Span 1 is [0.5, 1.0) and span 3 is [1.5, 2.0).
        let result = paste_span(&melody, 1, 3);
        assert_eq!(result.notes(), &[
            Note::new(0.25, 0.5, 60, 100),
            Note::new(1.0, 1.25, 62, 100),
            Note::new(1.5, 1.75, 60, 100),
            Note::new(1.75, 2.0, 62, 100),
        ]);
    }

    #[test]
    fn test_copy_paste_empties_the_source_span() {
        let halves = Melody::from(
            (0..COPY_PASTE_SPANS)
                .map(|i| Note::new(i as f64 * 0.5, i as f64 * 0.5 + 0.5, 60 + i as i16, 100))
                .collect::<Vec<_>>(),
        );
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..NUM_RANDOM_TESTS {
            let pasted = mutate_copy_paste_beats(&halves, 1.0, &mut rng).unwrap();
            assert!(well_formed(&pasted));
            // One span loses its note, another takes the moved one.
            assert_eq!(pasted.len(), COPY_PASTE_SPANS - 1);
            let pitches = pasted.iter().map(|n| n.pitch()).collect::<std::collections::BTreeSet<_>>();
            assert_eq!(pitches.len(), COPY_PASTE_SPANS - 1);
            let moved = pasted
                .iter()
                .filter(|n| n.start() != (n.pitch() - 60) as f64 * 0.5)
                .count();
            assert_eq!(moved, 1);
            assert!(pasted.iter().all(|n| n.duration() == 0.5));
        }
    }

    #[test]
    fn test_clip_and_clear() {
        let note = Note::new(0.25, 1.25, 60, 100);
        assert_eq!(clipped(&note, 0.5, 1.0), Some(note.retimed(0.5, 1.0)));
        assert_eq!(clipped(&note, 1.5, 2.0), None);
        assert_eq!(clipped(&note, 1.25, 1.75), None);

        let melody = Melody::from(vec![
            note,
            Note::new(1.25, 1.5, 62, 100),
            Note::new(1.75, 2.5, 64, 100),
        ]);
        let result = cleared(&melody, 0.5, 1.0);
        assert_eq!(result.notes(), &[
            note.retimed(0.25, 0.5),
            note.retimed(1.0, 1.25),
            melody[1],
            melody[2],
        ]);
        let result = cleared(&melody, 1.0, 2.0);
        assert_eq!(result.notes(), &[
            note.retimed(0.25, 1.0),
            melody[2].retimed(2.0, 2.5),
        ]);
    }

    #[test]
    fn test_add_or_remove_always() {
        let original = four_whole_notes();
        let mut rng = StdRng::seed_from_u64(22);
        let mut changed = 0;
        for _ in 0..NUM_RANDOM_TESTS {
            let result = mutate_add_or_remove_notes(&original, &scale(), 1.0, &mut rng).unwrap();
            assert!(result.len() == 4 || result.len() == 5);
            assert!(well_formed(&result));
            if result.len() != original.len() {
                changed += 1;
            }
        }
        assert!(changed > NUM_RANDOM_TESTS / 10);
    }

    #[test]
    fn test_add_or_remove_never() {
        let original = Melody::from(vec![Note::new(0.0, 1.0, 60, 100)]);
        let mut rng = StdRng::seed_from_u64(23);
        assert_eq!(mutate_add_or_remove_notes(&original, &scale(), 0.0, &mut rng).unwrap(), original);
    }

    #[test]
    fn test_remove_keeps_at_least_four() {
        let mut five = four_whole_notes();
        five.add(Note::new(4.0, 5.0, 67, 100));
        let mut rng = StdRng::seed_from_u64(24);
        for _ in 0..NUM_RANDOM_TESTS {
            let result = mutate_add_or_remove_notes(&five, &scale(), 1.0, &mut rng).unwrap();
            assert!(result.len() >= 4 && result.len() <= 6);
            assert!(well_formed(&result));
        }
    }

    #[test]
    fn test_add_to_empty_melody() {
        let mut rng = StdRng::seed_from_u64(25);
        for _ in 0..NUM_RANDOM_TESTS {
            let result = mutate_add_or_remove_notes(&Melody::new(), &scale(), 1.0, &mut rng).unwrap();
            assert!(result.len() <= 1);
            assert!(result.iter().all(|n| scale().contains(n.pitch())));
        }
    }

    #[test]
    fn test_pipeline_keeps_generated_melodies_well_formed() {
        let scale = scale();
        let params = MutationParameters::new(0.5, 0.5, 0.5, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(26);
        for _ in 0..NUM_RANDOM_TESTS {
            let mut parents = Population::new();
            parents.insert(1, generate_melody(&scale, &mut rng));
            parents.insert(2, generate_melody(&scale, &mut rng));
            let snapshot = parents.clone();
            let children = mutate(&parents, &scale, &params, &mut rng).unwrap();
            assert_eq!(parents, snapshot);
            for child in children.values() {
                assert!(well_formed(child), "{child:?}");
                assert!(child.iter().all(|n| scale.contains(n.pitch())));
            }
        }
    }
}
