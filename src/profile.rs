//! User profile access and the host collaborator seams
//!
//! The engine never talks to the host platform directly: the session store,
//! the rendering layer, and the developer-facing diagnostic surface are all
//! reached through the traits defined here.

use crate::registry::InstanceContext;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Attribute bag for the current user, as handed over by the host session
/// store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    attributes: Map<String, Value>,
}

impl Profile {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    /// Build a profile from key/value pairs; convenient for tests and
    /// embedded hosts.
    pub fn from_attributes<I, K, V>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            attributes: attrs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Interpret a JSON value as a profile. Accepts both a bare attribute
    /// object and the `{ "attributes": {...} }` wrapper produced by session
    /// stores; anything that is not an object yields `None`.
    pub fn from_json_value(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        if let Some(Value::Object(attrs)) = map.get("attributes").cloned() {
            return Some(Self::new(attrs));
        }
        Some(Self::new(map))
    }

    /// Raw attribute value by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute as a string, when it is one
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)?.as_str()
    }

    /// Attribute as a boolean, when it is one
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key)?.as_bool()
    }

    /// Attribute as a number, when it is one
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key)?.as_f64()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Asynchronous session/profile source provided by the host platform
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the current user's profile. `None` means there is no
    /// authenticated user.
    async fn fetch_profile(&self) -> Result<Option<Profile>>;
}

/// Host rendering hook that boots the content inside a visible container
#[async_trait]
pub trait ChildInitializer<E>: Send + Sync {
    async fn initialize_children(&self, element: &E, context: &InstanceContext) -> Result<()>;
}

/// Developer-facing surfacing of skipped conditions and sign-in state.
/// Hosts attach one only in preview/development contexts; production pages
/// run without it.
pub trait DiagnosticSink: Send + Sync {
    fn notify(&self, message: &str);
}
