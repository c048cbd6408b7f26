use std::collections::BTreeMap;
use std::fmt;

/// One point of a module's variant space, axis -> value
///
/// The default variant has no axes. Ordering follows the sorted axis list,
/// so sorting instances by (name, variant) is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variant(BTreeMap<String, String>);

impl Variant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, axis: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(axis.into(), value.into());
        self
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every axis of `self` has the same value in `other`
    pub fn is_subset_of(&self, other: &Variant) -> bool {
        self.0.iter().all(|(axis, value)| other.0.get(axis) == Some(value))
    }

    /// Cartesian product of the given axes; no axes yields the default variant
    pub fn expand(axes: &BTreeMap<String, Vec<String>>) -> Vec<Variant> {
        axes.iter().fold(vec![Variant::new()], |acc, (axis, values)| {
            acc.iter()
                .flat_map(|base| {
                    values
                        .iter()
                        .map(move |value| base.clone().with(axis.clone(), value.clone()))
                })
                .collect()
        })
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (axis, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", axis, value)?;
            first = false;
        }
        Ok(())
    }
}
