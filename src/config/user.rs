use crate::apply::Request;
use crate::error::{Error, Result};
use crate::privilege::PrivilegeDemand;
use crate::role::{Password, RoleAttrFlags};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target state of the user.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Present => write!(f, "present"),
            State::Absent => write!(f, "absent"),
        }
    }
}

/// Declared user section.
///
/// For example:
///
/// ```yaml
/// user:
///   name: django
///   password: ${DJANGO_PASSWORD}
///   db: acme
///   priv: CONNECT/products:ALL
///   role_attr_flags: CREATEDB,NOSUPERUSER
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    // password is only required when the user is created
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub encrypted: bool,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub no_password_changes: bool,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default, rename = "priv")]
    pub privileges: Option<String>,
    #[serde(default)]
    pub role_attr_flags: Option<String>,
    #[serde(default = "default_true")]
    pub fail_on_user: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    /// Check everything that can be checked without a connection and build
    /// the reconcile request.
    pub fn to_request(&self) -> Result<Request> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::Config("user name is empty".to_string()));
        }

        let privileges = PrivilegeDemand::parse(self.privileges.as_deref(), self.db.as_deref())?;
        let flags = match &self.role_attr_flags {
            Some(flags) => flags.parse::<RoleAttrFlags>()?,
            None => RoleAttrFlags::default(),
        };
        let password = self
            .password
            .as_deref()
            .map(|password| Password::new(name, password, self.encrypted));

        Ok(Request {
            user: name.to_string(),
            password,
            no_password_changes: self.no_password_changes,
            expires: self.expires.clone(),
            state: self.state,
            privileges,
            flags,
            fail_on_user: self.fail_on_user,
            dry_run: false,
        })
    }

    /// Database the session connects to.
    pub fn session_database(&self) -> Option<&str> {
        self.db.as_deref().filter(|db| !db.is_empty())
    }
}
