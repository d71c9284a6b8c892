use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prompt text -> answer, in the order the prompts were answered.
/// Serialises as a flat JSON object, preserving that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerRecord {
    entries: Vec<(String, String)>,
}

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an answer. A repeated prompt overwrites in place, keeping its position.
    pub fn insert(&mut self, prompt: impl Into<String>, answer: impl Into<String>) {
        let prompt = prompt.into();
        let answer = answer.into();
        match self.entries.iter_mut().find(|(p, _)| *p == prompt) {
            Some(entry) => entry.1 = answer,
            None => self.entries.push((prompt, answer)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, prompt: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == prompt)
            .map(|(_, a)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, a)| (p.as_str(), a.as_str()))
    }
}

impl Serialize for AnswerRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (prompt, answer) in self.iter() {
            map.serialize_entry(prompt, answer)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = AnswerRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a flat object of prompt -> answer strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut record = AnswerRecord::new();
        while let Some((prompt, answer)) = access.next_entry::<String, String>()? {
            record.insert(prompt, answer);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for AnswerRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}
