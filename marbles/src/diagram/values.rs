//! Marker-to-value resolution.
//!
//! Markers are resolved once, at parse time, into typed values. A marker
//! present in the [`ValueMap`] wins; otherwise the value type may provide a
//! default through [`MarkerValue`].

use std::collections::BTreeMap;

/// Conversion between marker characters and values.
///
/// Types without a natural single-character form (composite values such as
/// a time interval pair) keep the defaults and must be listed in a
/// [`ValueMap`].
pub trait MarkerValue: Sized {
    /// The value a marker stands for when the value map does not mention it.
    fn from_marker(marker: char) -> Option<Self> {
        let _ = marker;
        None
    }

    /// The marker to render for this value when the value map does not
    /// mention it.
    fn to_marker(&self) -> Option<char> {
        None
    }
}

impl MarkerValue for char {
    fn from_marker(marker: char) -> Option<Self> {
        Some(marker)
    }

    fn to_marker(&self) -> Option<char> {
        Some(*self)
    }
}

impl MarkerValue for String {
    fn from_marker(marker: char) -> Option<Self> {
        Some(marker.to_string())
    }

    fn to_marker(&self) -> Option<char> {
        let mut chars = self.chars();
        match (chars.next(), chars.next()) {
            (Some(marker), None) => Some(marker),
            _ => None,
        }
    }
}

macro_rules! digit_marker_value {
    ($($ty:ty),*) => {
        $(
            impl MarkerValue for $ty {
                fn from_marker(marker: char) -> Option<Self> {
                    marker.to_digit(10).and_then(|digit| <$ty>::try_from(digit).ok())
                }

                fn to_marker(&self) -> Option<char> {
                    u32::try_from(*self).ok().and_then(|digit| char::from_digit(digit, 10))
                }
            }
        )*
    };
}

digit_marker_value!(u8, u16, u32, u64, usize, i32, i64);

/// Explicit mapping from marker characters to values.
///
/// Backed by an ordered map so reverse lookups are deterministic even when
/// two markers share a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMap<T> {
    values: BTreeMap<char, T>,
}

impl<T> ValueMap<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Add a mapping, builder style.
    #[must_use]
    pub fn with(mut self, marker: char, value: T) -> Self {
        self.values.insert(marker, value);
        self
    }

    /// Add a mapping, replacing any previous value for the marker.
    pub fn insert(&mut self, marker: char, value: T) -> Option<T> {
        self.values.insert(marker, value)
    }

    #[must_use]
    pub fn get(&self, marker: char) -> Option<&T> {
        self.values.get(&marker)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Clone + MarkerValue> ValueMap<T> {
    /// Resolve a marker: the mapped value if present, otherwise the type's
    /// default for that marker.
    #[must_use]
    pub fn resolve(&self, marker: char) -> Option<T> {
        self.values
            .get(&marker)
            .cloned()
            .or_else(|| T::from_marker(marker))
    }
}

impl<T: PartialEq + MarkerValue> ValueMap<T> {
    /// Find the marker that renders `value`: the first mapped marker with an
    /// equal value, otherwise the type's own marker.
    #[must_use]
    pub fn marker_for(&self, value: &T) -> Option<char> {
        self.values
            .iter()
            .find(|(_, candidate)| *candidate == value)
            .map(|(marker, _)| *marker)
            .or_else(|| value.to_marker())
    }
}

impl<T> Default for ValueMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(char, T)> for ValueMap<T> {
    fn from_iter<I: IntoIterator<Item = (char, T)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_mapping() {
        let values = ValueMap::new().with('a', "apple".to_string());
        assert_eq!(values.resolve('a'), Some("apple".to_string()));
        assert_eq!(values.resolve('b'), Some("b".to_string()));
    }

    #[test]
    fn test_digit_defaults() {
        let values: ValueMap<u32> = ValueMap::new();
        assert_eq!(values.resolve('7'), Some(7));
        assert_eq!(values.resolve('x'), None);
        assert_eq!(values.marker_for(&3), Some('3'));
        assert_eq!(values.marker_for(&42), None);
    }

    #[test]
    fn test_marker_for_is_deterministic() {
        let values: ValueMap<i64> = [('z', 1), ('b', 1), ('m', 2)].into_iter().collect();
        assert_eq!(values.marker_for(&1), Some('b'));
        assert_eq!(values.marker_for(&2), Some('m'));
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_string_marker_requires_single_char() {
        assert_eq!("q".to_string().to_marker(), Some('q'));
        assert_eq!("qq".to_string().to_marker(), None);
        assert_eq!(String::new().to_marker(), None);
    }
}
