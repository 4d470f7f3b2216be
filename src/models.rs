use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Login payload as npm sends it on `PUT /-/user/org.couchdb.user:<name>`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

impl Credentials {
    pub fn new(
        name: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("password", &"***")
            .field("email", &self.email)
            .finish()
    }
}

/// Identity attached to a token. Echoes the login payload; not verified
/// server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
}

/// Result of a successful login, relayed by the host to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: Identity,
}

/// Package metadata, either asserted by the client in a publish body or
/// fetched from the front door.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ResourceDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            rest: Map::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Publish,
}

impl Operation {
    /// npm uploads packages with `PUT`; everything else is treated as a read.
    pub fn from_method(method: &axum::http::Method) -> Self {
        if *method == axum::http::Method::PUT {
            Self::Publish
        } else {
            Self::Read
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Publish => "publish",
        }
    }
}
