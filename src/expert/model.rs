//! Expert profile data model.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker stored in place of a value that was never provided.
pub const NOT_SET: &str = "NOT SET";

/// One attribute of the profile: either `NOT SET` or a non-empty string.
///
/// Construction goes through [`FieldValue::from_input`], so an empty or
/// whitespace-only string can never be stored as a real value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldValue(Option<String>);

impl FieldValue {
    pub const fn not_set() -> Self {
        Self(None)
    }

    /// Normalize raw input. Missing, blank, or literal `NOT SET` input is unset.
    pub fn from_input(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() && v.trim() != NOT_SET => Self(Some(v.to_string())),
            _ => Self(None),
        }
    }

    pub fn set(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::from_input(Some(&value))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// The stored value, or the `NOT SET` sentinel.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or(NOT_SET)
    }

    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_input(raw.as_deref()))
    }
}

/// The three editable attributes of an expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Description,
    Instructions,
}

impl ProfileField {
    pub const ALL: [ProfileField; 3] = [Self::Name, Self::Description, Self::Instructions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Instructions => "instructions",
        }
    }
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "instructions" => Ok(Self::Instructions),
            other => Err(format!(
                "unknown profile field '{other}' (expected name, description or instructions)"
            )),
        }
    }
}

/// The structured Expert record built up over the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpertProfile {
    #[serde(default)]
    pub name: FieldValue,
    #[serde(default)]
    pub description: FieldValue,
    #[serde(default)]
    pub instructions: FieldValue,
}

impl ExpertProfile {
    /// A profile with every attribute `NOT SET`.
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn get(&self, field: ProfileField) -> &FieldValue {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::Description => &self.description,
            ProfileField::Instructions => &self.instructions,
        }
    }

    pub fn set(&mut self, field: ProfileField, value: FieldValue) {
        match field {
            ProfileField::Name => self.name = value,
            ProfileField::Description => self.description = value,
            ProfileField::Instructions => self.instructions = value,
        }
    }

    /// Fields that are still `NOT SET`, in display order.
    pub fn missing_fields(&self) -> Vec<ProfileField> {
        ProfileField::ALL
            .into_iter()
            .filter(|f| !self.get(*f).is_set())
            .collect()
    }

    /// Overlay `update` on top of `self`: set fields in `update` win,
    /// unset fields in `update` keep the current value.
    pub fn merged_with(&self, update: &ExpertProfile) -> ExpertProfile {
        let mut merged = self.clone();
        for field in ProfileField::ALL {
            let value = update.get(field);
            if value.is_set() {
                merged.set(field, value.clone());
            }
        }
        merged
    }

    /// Human-readable rendering used in status messages and prompts.
    pub fn render(&self) -> String {
        format!(
            "Name: {}\nDescription: {}\nInstructions: {}",
            self.name, self.description, self.instructions
        )
    }
}
