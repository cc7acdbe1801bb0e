use crate::error::{check_unit_interval, EvolveError, EvolveResult};
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SWEET_SPOT: f64 = 0.8;
pub const DEFAULT_MUTATION_PROBABILITY: f64 = 0.1;

/// The statistical fitness criteria. Each measures a ratio in [0,1] that is
/// compared against a user-chosen sweet spot.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Statistic {
    ExtremePitchDifference,
    DirectionOfMelody,
    DirectionalChangesRatio,
    OffBeatNotesRatio,
    LowestToHighestPitchRatio,
    UniquePitchRatio,
    ConsecutivePitchesRatio,
    UniqueRhythmRatio,
}

impl Statistic {
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::ExtremePitchDifference => "extremePitchDifference",
            Statistic::DirectionOfMelody => "directionOfMelody",
            Statistic::DirectionalChangesRatio => "directionalChangesRatio",
            Statistic::OffBeatNotesRatio => "offBeatNotesRatio",
            Statistic::LowestToHighestPitchRatio => "lowestToHighestPitchRatio",
            Statistic::UniquePitchRatio => "uniquePitchRatio",
            Statistic::ConsecutivePitchesRatio => "consecutivePitchesRatio",
            Statistic::UniqueRhythmRatio => "uniqueRhythmRatio",
        }
    }
}

/// Sweet spots per statistic. A statistic without an entry is aimed at
/// `DEFAULT_SWEET_SPOT`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Statistic, f64>", into = "BTreeMap<Statistic, f64>")]
pub struct FitnessParameters {
    sweet_spots: BTreeMap<Statistic, f64>,
}

impl FitnessParameters {
    pub fn new(sweet_spots: BTreeMap<Statistic, f64>) -> EvolveResult<Self> {
        for (statistic, value) in sweet_spots.iter() {
            check_unit_interval(*value, statistic.name())?;
        }
        Ok(FitnessParameters { sweet_spots })
    }

    /// Every statistic at `DEFAULT_SWEET_SPOT`.
    pub fn uniform() -> Self {
        FitnessParameters {
            sweet_spots: BTreeMap::new(),
        }
    }

    pub fn sweet_spot(&self, statistic: Statistic) -> f64 {
        self.sweet_spots
            .get(&statistic)
            .copied()
            .unwrap_or(DEFAULT_SWEET_SPOT)
    }

    pub fn with(&self, statistic: Statistic, sweet_spot: f64) -> EvolveResult<Self> {
        check_unit_interval(sweet_spot, statistic.name())?;
        let mut result = self.clone();
        result.sweet_spots.insert(statistic, sweet_spot);
        Ok(result)
    }
}

impl Default for FitnessParameters {
    fn default() -> Self {
        let sweet_spots = all::<Statistic>()
            .map(|s| {
                let spot = match s {
                    Statistic::ExtremePitchDifference => 0.1,
                    Statistic::DirectionOfMelody => 0.5,
                    Statistic::DirectionalChangesRatio => 0.2,
                    Statistic::OffBeatNotesRatio => 0.4,
                    Statistic::LowestToHighestPitchRatio => 0.72,
                    Statistic::UniquePitchRatio => 0.4,
                    Statistic::ConsecutivePitchesRatio => 0.3,
                    Statistic::UniqueRhythmRatio => 0.3,
                };
                (s, spot)
            })
            .collect();
        FitnessParameters { sweet_spots }
    }
}

impl TryFrom<BTreeMap<Statistic, f64>> for FitnessParameters {
    type Error = EvolveError;

    fn try_from(sweet_spots: BTreeMap<Statistic, f64>) -> Result<Self, Self::Error> {
        Self::new(sweet_spots)
    }
}

impl From<FitnessParameters> for BTreeMap<Statistic, f64> {
    fn from(params: FitnessParameters) -> Self {
        params.sweet_spots
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMutationParameters {
    alter_pitches_probability: f64,
    move_notes_probability: f64,
    copy_paste_beat_probability: f64,
    add_or_remove_notes_probability: f64,
}

/// Pitch alteration and note moves roll once per note; copy-paste and
/// add/remove roll once per melody.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMutationParameters", into = "RawMutationParameters")]
pub struct MutationParameters {
    alter_pitches: f64,
    move_notes: f64,
    copy_paste_beat: f64,
    add_or_remove_notes: f64,
}

impl MutationParameters {
    pub fn new(
        alter_pitches: f64,
        move_notes: f64,
        copy_paste_beat: f64,
        add_or_remove_notes: f64,
    ) -> EvolveResult<Self> {
        Ok(MutationParameters {
            alter_pitches: check_unit_interval(alter_pitches, "alterPitchesProbability")?,
            move_notes: check_unit_interval(move_notes, "moveNotesProbability")?,
            copy_paste_beat: check_unit_interval(copy_paste_beat, "copyPasteBeatProbability")?,
            add_or_remove_notes: check_unit_interval(
                add_or_remove_notes,
                "addOrRemoveNotesProbability",
            )?,
        })
    }

    pub fn alter_pitches(&self) -> f64 {
        self.alter_pitches
    }

    pub fn move_notes(&self) -> f64 {
        self.move_notes
    }

    pub fn copy_paste_beat(&self) -> f64 {
        self.copy_paste_beat
    }

    pub fn add_or_remove_notes(&self) -> f64 {
        self.add_or_remove_notes
    }
}

impl Default for MutationParameters {
    fn default() -> Self {
        MutationParameters {
            alter_pitches: DEFAULT_MUTATION_PROBABILITY,
            move_notes: DEFAULT_MUTATION_PROBABILITY,
            copy_paste_beat: DEFAULT_MUTATION_PROBABILITY,
            add_or_remove_notes: DEFAULT_MUTATION_PROBABILITY,
        }
    }
}

impl TryFrom<RawMutationParameters> for MutationParameters {
    type Error = EvolveError;

    fn try_from(raw: RawMutationParameters) -> Result<Self, Self::Error> {
        Self::new(
            raw.alter_pitches_probability,
            raw.move_notes_probability,
            raw.copy_paste_beat_probability,
            raw.add_or_remove_notes_probability,
        )
    }
}

impl From<MutationParameters> for RawMutationParameters {
    fn from(params: MutationParameters) -> Self {
        RawMutationParameters {
            alter_pitches_probability: params.alter_pitches,
            move_notes_probability: params.move_notes,
            copy_paste_beat_probability: params.copy_paste_beat,
            add_or_remove_notes_probability: params.add_or_remove_notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sweet_spot_defaults() {
        let params = FitnessParameters::uniform();
        for s in all::<Statistic>() {
            assert_eq!(params.sweet_spot(s), DEFAULT_SWEET_SPOT);
        }
        let params = params.with(Statistic::UniquePitchRatio, 0.25).unwrap();
        assert_eq!(params.sweet_spot(Statistic::UniquePitchRatio), 0.25);
        assert_eq!(params.sweet_spot(Statistic::DirectionOfMelody), DEFAULT_SWEET_SPOT);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(FitnessParameters::uniform().with(Statistic::DirectionOfMelody, 1.5).is_err());
        assert!(FitnessParameters::uniform().with(Statistic::DirectionOfMelody, -0.1).is_err());
        assert!(FitnessParameters::uniform().with(Statistic::DirectionOfMelody, f64::NAN).is_err());
        assert!(MutationParameters::new(0.1, 0.1, 1.01, 0.1).is_err());
        assert!(MutationParameters::new(-0.5, 0.1, 0.1, 0.1).is_err());
        assert!(MutationParameters::new(0.0, 1.0, 0.5, 0.25).is_ok());
    }

    #[test]
    fn test_json_names() {
        let fitness: FitnessParameters =
            serde_json::from_str(r#"{"uniquePitchRatio": 0.4, "directionOfMelody": 0.5}"#).unwrap();
        assert_eq!(fitness.sweet_spot(Statistic::UniquePitchRatio), 0.4);
        assert_eq!(fitness.sweet_spot(Statistic::OffBeatNotesRatio), DEFAULT_SWEET_SPOT);
        assert!(serde_json::from_str::<FitnessParameters>(r#"{"uniquePitchRatio": 2.0}"#).is_err());

        let mutation: MutationParameters = serde_json::from_str(
            r#"{"alterPitchesProbability": 0.2, "moveNotesProbability": 0.3,
                "copyPasteBeatProbability": 0.4, "addOrRemoveNotesProbability": 0.5}"#,
        )
        .unwrap();
        assert_eq!(mutation, MutationParameters::new(0.2, 0.3, 0.4, 0.5).unwrap());
        let json = serde_json::to_string(&MutationParameters::default()).unwrap();
        assert!(json.contains("\"copyPasteBeatProbability\":0.1"));
    }
}
