use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};

/// Role claim held by a user.
///
/// Roles are opaque names at this layer. The Auth API sends them either as
/// bare strings or as role objects; both decode to the same value, and the
/// client always writes the object form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Role {
    name: Cow<'static, str>,
}

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Name(String),
            Object { name: String },
        }

        match Wire::deserialize(deserializer)? {
            Wire::Name(name) | Wire::Object { name } => Ok(Self::new(name)),
        }
    }
}
