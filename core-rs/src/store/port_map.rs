//! Ordered variable → port map
//!
//! One worktree's allocations. Entry order is the variable declaration order
//! and survives JSON round trips so the generated `.env` stays stable.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    entries: Vec<(String, u16)>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, variable: &str) -> Option<u16> {
        self.entries
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, port)| *port)
    }

    pub fn contains_key(&self, variable: &str) -> bool {
        self.get(variable).is_some()
    }

    /// Insert or update in place; a new variable goes to the end
    ///
    /// # Returns
    /// The previous port, if the variable was already present
    pub fn insert(&mut self, variable: impl Into<String>, port: u16) -> Option<u16> {
        let variable = variable.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == variable) {
            return Some(std::mem::replace(&mut entry.1, port));
        }
        self.entries.push((variable, port));
        None
    }

    pub fn remove(&mut self, variable: &str) -> Option<u16> {
        let index = self.entries.iter().position(|(name, _)| name == variable)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> + '_ {
        self.entries.iter().map(|(name, port)| (name.as_str(), *port))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|(_, port)| *port)
    }

    /// First variable, in order, whose port is also held by an earlier variable
    pub fn first_duplicate(&self) -> Option<(&str, u16)> {
        self.entries.iter().enumerate().find_map(|(i, (name, port))| {
            self.entries[..i]
                .iter()
                .any(|(_, earlier)| earlier == port)
                .then_some((name.as_str(), *port))
        })
    }
}

impl FromIterator<(String, u16)> for PortMap {
    fn from_iter<I: IntoIterator<Item = (String, u16)>>(iter: I) -> Self {
        let mut map = PortMap::new();
        for (variable, port) in iter {
            map.insert(variable, port);
        }
        map
    }
}

impl<'a> IntoIterator for &'a PortMap {
    type Item = (&'a str, u16);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, u16)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Serialize for PortMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, port) in &self.entries {
            map.serialize_entry(name, port)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PortMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortMapVisitor;

        impl<'de> Visitor<'de> for PortMapVisitor {
            type Value = PortMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of variable names to port numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PortMap, A::Error> {
                let mut map = PortMap::new();
                while let Some((variable, port)) = access.next_entry::<String, u16>()? {
                    map.insert(variable, port);
                }
                Ok(map)
            }

            // Older tables were written by a serializer that emitted `[]` for empty maps
            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<PortMap, A::Error> {
                match access.next_element::<de::IgnoredAny>()? {
                    None => Ok(PortMap::new()),
                    Some(_) => Err(de::Error::invalid_type(de::Unexpected::Seq, &self)),
                }
            }
        }

        deserializer.deserialize_any(PortMapVisitor)
    }
}
