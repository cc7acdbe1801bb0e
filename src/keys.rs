use crate::error::EvolveError;
use crate::melody::{MidiByte, Scale, HIGHEST_PIANO_PITCH, LOWEST_PIANO_PITCH};
use enum_iterator::{all, Sequence};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const NOTES_PER_OCTAVE: MidiByte = 12;
const PIANO_OCTAVES: MidiByte = 8;
const MAJOR_PATTERN: [MidiByte; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_PATTERN: [MidiByte; 7] = [0, 2, 3, 5, 7, 8, 10];

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Sequence)]
pub enum Tonic {
    C, CSharp, D, DSharp, E, F, FSharp, G, GSharp, A, ASharp, B
}

impl Tonic {
    /// The lowest instance of this pitch class that a scale is built from.
    /// A, A# and B start below C1 so the piano's bottom keys are covered.
    pub fn root_pitch(&self) -> MidiByte {
        match self {
            Tonic::C => 24,
            Tonic::CSharp => 25,
            Tonic::D => 26,
            Tonic::DSharp => 27,
            Tonic::E => 28,
            Tonic::F => 29,
            Tonic::FSharp => 30,
            Tonic::G => 31,
            Tonic::GSharp => 32,
            Tonic::A => 21,
            Tonic::ASharp => 22,
            Tonic::B => 23,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Tonic::C => "C",
            Tonic::CSharp => "C#",
            Tonic::D => "D",
            Tonic::DSharp => "D#",
            Tonic::E => "E",
            Tonic::F => "F",
            Tonic::FSharp => "F#",
            Tonic::G => "G",
            Tonic::GSharp => "G#",
            Tonic::A => "A",
            Tonic::ASharp => "A#",
            Tonic::B => "B",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Sequence)]
pub enum Quality {
    Major, Minor
}

impl Quality {
    fn pattern(&self) -> &'static [MidiByte; 7] {
        match self {
            Quality::Major => &MAJOR_PATTERN,
            Quality::Minor => &MINOR_PATTERN,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Sequence)]
pub struct Key {
    tonic: Tonic,
    quality: Quality,
}

lazy_static! {
    static ref SCALE_TABLE: BTreeMap<Key, Scale> = all::<Key>()
        .map(|key| (key, key.build_scale()))
        .collect();
}

impl Default for Key {
    fn default() -> Self {
        Key::new(Tonic::C, Quality::Major)
    }
}

impl Key {
    pub fn new(tonic: Tonic, quality: Quality) -> Self {
        Key { tonic, quality }
    }

    pub fn tonic(&self) -> Tonic {
        self.tonic
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn scale(&self) -> &'static Scale {
        &SCALE_TABLE[self]
    }

    /// Name without spaces or symbols, e.g. `CSharpMinor`.
    pub fn internal_name(&self) -> String {
        format!("{:?}{:?}", self.tonic, self.quality)
    }

    fn build_scale(&self) -> Scale {
        let root = self.tonic.root_pitch();
        let pitches = (0..PIANO_OCTAVES)
            .flat_map(|octave| {
                self.quality
                    .pattern()
                    .iter()
                    .map(move |step| root + NOTES_PER_OCTAVE * octave + step)
            })
            .filter(|p| (LOWEST_PIANO_PITCH..=HIGHEST_PIANO_PITCH).contains(p))
            .collect();
        // Roots and patterns are fixed and ascending, so this cannot fail.
        Scale::new(pitches).unwrap_or_else(|e| panic!("key table for {self}: {e}"))
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.tonic.symbol(), self.quality)
    }
}

impl FromStr for Key {
    type Err = EvolveError;

    /// Accepts either the display name (`"C# Major"`) or the internal name
    /// (`"CSharpMajor"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        all::<Key>()
            .find(|key| key.to_string() == s || key.internal_name() == s)
            .ok_or_else(|| EvolveError::InvalidInput(format!("unknown key: {s}")))
    }
}

impl Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.internal_name().as_str())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_major() {
        let scale = Key::default().scale();
        assert_eq!(scale.pitches()[0], 24);
        assert!(scale.contains(60));
        assert!(scale.contains(62));
        assert!(!scale.contains(61));
        assert_eq!(*scale.pitches().last().unwrap(), 108);
        assert_eq!(scale.len(), 7 * 7 + 1);
    }

    #[test]
    fn test_a_minor_reaches_bottom_key() {
        let scale = Key::new(Tonic::A, Quality::Minor).scale();
        assert_eq!(&scale.pitches()[..4], &[21, 23, 24, 26]);
    }

    #[test]
    fn test_all_scales_in_piano_range() {
        assert_eq!(all::<Key>().count(), 24);
        for key in all::<Key>() {
            let scale = key.scale();
            assert!(scale.len() >= 2);
            assert!(scale.pitches().iter().all(|p| (21..=108).contains(p)));
        }
    }

    #[test]
    fn test_names() {
        let key = Key::new(Tonic::CSharp, Quality::Minor);
        assert_eq!(key.to_string(), "C# Minor");
        assert_eq!(key.internal_name(), "CSharpMinor");
        assert_eq!("C# Minor".parse::<Key>().unwrap(), key);
        assert_eq!("CSharpMinor".parse::<Key>().unwrap(), key);
        assert_eq!(key.tonic(), Tonic::CSharp);
        assert_eq!(key.quality(), Quality::Minor);
        assert!("H Major".parse::<Key>().is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"CSharpMinor\"");
    }
}
