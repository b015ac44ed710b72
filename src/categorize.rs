//! Label categorization by ordered keyword tables.
//!
//! A label is matched case-insensitively against each table in order and
//! takes the category of the first table with a keyword contained in the
//! label name. Positive is checked first, so a label that mentions both a
//! positive and a negative keyword is classified positive.

use crate::models::Category;

/// Ordered `(value, keywords)` pairs with first-match lookup.
///
/// Keywords are stored lowercase; lookups lowercase the input once.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable<T> {
    entries: Vec<(T, Vec<String>)>,
}

impl<T: Copy> KeywordTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry. Entries are checked in insertion order.
    pub fn with<S: AsRef<str>>(mut self, value: T, keywords: &[S]) -> Self {
        self.push(value, keywords);
        self
    }

    pub fn push<S: AsRef<str>>(&mut self, value: T, keywords: &[S]) {
        let keywords = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self.entries.push((value, keywords));
    }

    /// Value of the first entry with a keyword that is a substring of `text`.
    pub fn first_match(&self, text: &str) -> Option<T> {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(value, _)| *value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Copy> Default for KeywordTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub const POSITIVE_KEYWORDS: &[&str] = &[
    "ramp",
    "elevator",
    "lift",
    "wide doorway",
    "wide hallway",
    "wide door",
    "accessible",
    "grab bar",
    "handrail",
    "safety rail",
    "good lighting",
    "clear pathway",
    "wheelchair",
    "lever handle",
    "walk-in shower",
    "roll-in shower",
    "zero threshold",
    "level entry",
];

pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "stair",
    "step",
    "narrow",
    "threshold",
    "trip hazard",
    "slippery",
    "uneven",
    "clutter",
    "poor lighting",
    "obstacle",
    "curb",
    "bathtub",
];

pub const SAFETY_KEYWORDS: &[&str] = &[
    "smoke detector",
    "smoke alarm",
    "fire extinguisher",
    "exit sign",
    "carbon monoxide",
    "sprinkler",
    "first aid",
    "emergency",
    "alarm",
];

pub const MEASUREMENT_KEYWORDS: &[&str] = &[
    "width",
    "height",
    "inch",
    "feet",
    "measurement",
    "dimension",
    "clearance",
    "tape measure",
];

pub const ROOM_KEYWORDS: &[&str] = &[
    "bathroom",
    "kitchen",
    "bedroom",
    "living room",
    "dining room",
    "hallway",
    "entrance",
    "entryway",
    "garage",
    "porch",
    "laundry",
    "closet",
    "door",
];

/// Classifies label names into accessibility categories.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCategorizer {
    table: KeywordTable<Category>,
}

impl LabelCategorizer {
    /// Build a categorizer from a custom ordered table.
    pub fn with_table(table: KeywordTable<Category>) -> Self {
        Self { table }
    }

    /// Category for a label name; `General` when no table matches.
    pub fn categorize(&self, name: &str) -> Category {
        self.table.first_match(name).unwrap_or(Category::General)
    }
}

impl Default for LabelCategorizer {
    fn default() -> Self {
        let table = KeywordTable::new()
            .with(Category::Positive, POSITIVE_KEYWORDS)
            .with(Category::Negative, NEGATIVE_KEYWORDS)
            .with(Category::Safety, SAFETY_KEYWORDS)
            .with(Category::Measurement, MEASUREMENT_KEYWORDS)
            .with(Category::Room, ROOM_KEYWORDS);
        Self { table }
    }
}
