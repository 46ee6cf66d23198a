// Key - the 24 musical key enumerants and their display strings
//
// The enumerant order is fixed: it is the scan order used for tie-breaks in
// the vote tally and the index space of the tally array.

use std::fmt;

/// Number of votable keys (silence is not a key)
pub const KEY_COUNT: usize = 24;

/// Display string used before any key has been decided
pub const NO_KEY_DISPLAY: &str = "---";

/// A musical key as returned by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Key {
    AMajor,
    AMinor,
    BFlatMajor,
    BFlatMinor,
    BMajor,
    BMinor,
    CMajor,
    CMinor,
    DFlatMajor,
    DFlatMinor,
    DMajor,
    DMinor,
    EFlatMajor,
    EFlatMinor,
    EMajor,
    EMinor,
    FMajor,
    FMinor,
    GFlatMajor,
    GFlatMinor,
    GMajor,
    GMinor,
    AFlatMajor,
    AFlatMinor,
}

const ALL_KEYS: [Key; KEY_COUNT] = [
    Key::AMajor,
    Key::AMinor,
    Key::BFlatMajor,
    Key::BFlatMinor,
    Key::BMajor,
    Key::BMinor,
    Key::CMajor,
    Key::CMinor,
    Key::DFlatMajor,
    Key::DFlatMinor,
    Key::DMajor,
    Key::DMinor,
    Key::EFlatMajor,
    Key::EFlatMinor,
    Key::EMajor,
    Key::EMinor,
    Key::FMajor,
    Key::FMinor,
    Key::GFlatMajor,
    Key::GFlatMinor,
    Key::GMajor,
    Key::GMinor,
    Key::AFlatMajor,
    Key::AFlatMinor,
];

const KEY_NAMES: [&str; KEY_COUNT] = [
    "A maj", "A min", "Bb maj", "Bb min", "B maj", "B min", "C maj", "C min", "Db maj", "Db min",
    "D maj", "D min", "Eb maj", "Eb min", "E maj", "E min", "F maj", "F min", "Gb maj", "Gb min",
    "G maj", "G min", "Ab maj", "Ab min",
];

/// Pitch class of A with C = 0
const A_PITCH_CLASS: usize = 9;

impl Key {
    /// All keys in enumerant order
    pub fn all() -> &'static [Key; KEY_COUNT] {
        &ALL_KEYS
    }

    /// Position in the fixed enumerant order
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Key> {
        ALL_KEYS.get(index).copied()
    }

    /// Short display string, e.g. "Eb min"
    pub fn display_name(self) -> &'static str {
        KEY_NAMES[self.index()]
    }

    /// Build a key from its tonic pitch class (C = 0) and mode.
    pub fn from_tonic(pitch_class: usize, minor: bool) -> Key {
        let steps_from_a = (pitch_class % 12 + 12 - A_PITCH_CLASS) % 12;
        ALL_KEYS[steps_from_a * 2 + usize::from(minor)]
    }

    /// Tonic pitch class with C = 0
    pub fn tonic_pitch_class(self) -> usize {
        (self.index() / 2 + A_PITCH_CLASS) % 12
    }

    pub fn is_minor(self) -> bool {
        self.index() % 2 == 1
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.display_name())
    }
}
