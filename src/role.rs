use crate::error::{Error, Result};
use crate::session::{Session, Statement};
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;

/// Savepoint wrapped around `DROP USER`.
pub const DELETE_SAVEPOINT: &str = "pguser_user_delete";

/// Attributes accepted in `role_attr_flags`, each also valid with a `NO` prefix.
const VALID_FLAGS: &[&str] = &[
    "SUPERUSER",
    "CREATEROLE",
    "CREATEDB",
    "INHERIT",
    "LOGIN",
    "REPLICATION",
];

/// A role's attributes at one point in time, compared field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAttributeSnapshot {
    pub password: Option<String>,
    pub superuser: bool,
    pub inherit: bool,
    pub createrole: bool,
    pub createdb: bool,
    pub canlogin: bool,
    pub replication: bool,
    pub valid_until: Option<String>,
}

/// Validated attribute flags, passed through to the server as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAttrFlags(Vec<String>);

impl RoleAttrFlags {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromStr for RoleAttrFlags {
    type Err = Error;

    /// Parse a comma separated list such as `CREATEDB,NOSUPERUSER`.
    fn from_str(s: &str) -> Result<Self> {
        let mut flags = vec![];
        for flag in s.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let flag = flag.to_uppercase();
            let bare = flag.strip_prefix("NO").unwrap_or(&flag);
            if !VALID_FLAGS.contains(&bare) {
                return Err(Error::Config(format!(
                    "invalid role_attr_flags {}, expected one of: {:?} (optionally prefixed with NO)",
                    flag, VALID_FLAGS
                )));
            }
            flags.push(flag);
        }

        Ok(Self(flags))
    }
}

impl fmt::Display for RoleAttrFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// A password as it will be sent to the server.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    value: String,
    encrypted: bool,
}

impl Password {
    /// An encrypted password is sent in its md5 stored form, which keeps the
    /// stored hash identical across runs. Values already in that form are
    /// kept as they are.
    pub fn new(user: &str, password: &str, encrypted: bool) -> Self {
        let value = if encrypted && !is_md5_password(password) {
            md5_password(user, password)
        } else {
            password.to_string()
        };

        Self { value, encrypted }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

// Keep passwords out of debug logs
impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Password")
            .field("value", &"********")
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

/// md5 stored form of a password: `md5` + hex(md5(password + user)).
pub fn md5_password(user: &str, password: &str) -> String {
    let digest = md5::compute(format!("{}{}", password, user));
    format!("md5{:x}", digest)
}

fn is_md5_password(value: &str) -> bool {
    value.len() == 35
        && value.starts_with("md5")
        && value[3..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn user_exists(session: &mut dyn Session, user: &str) -> Result<bool> {
    session.role_exists(user)
}

/// Create the user. Always a change.
pub fn user_create(
    session: &mut dyn Session,
    user: &str,
    password: &Password,
    expires: Option<&str>,
    flags: &RoleAttrFlags,
) -> Result<bool> {
    session.execute(&Statement::CreateUser {
        user: user.to_string(),
        password: password.clone(),
        expires: expires.map(str::to_string),
        flags: flags.clone(),
    })?;
    info!("created user {}", user);

    Ok(true)
}

/// Alter an existing user, true if its attributes differ afterwards.
///
/// The server decides what the flags mean; the result comes from comparing
/// snapshots taken before and after the statement.
pub fn user_alter(
    session: &mut dyn Session,
    user: &str,
    password: Option<&Password>,
    expires: Option<&str>,
    flags: &RoleAttrFlags,
) -> Result<bool> {
    let before = snapshot(session, user)?;

    if password.is_none() && expires.is_none() && flags.is_empty() {
        debug!("nothing to alter for user {}", user);
        return Ok(false);
    }

    session.execute(&Statement::AlterUser {
        user: user.to_string(),
        password: password.cloned(),
        expires: expires.map(str::to_string),
        flags: flags.clone(),
    })?;

    let after = snapshot(session, user)?;

    Ok(before != after)
}

fn snapshot(session: &mut dyn Session, user: &str) -> Result<RoleAttributeSnapshot> {
    session.role_attributes(user)?.ok_or_else(|| {
        Error::Precondition(format!("cannot alter user {}, it does not exist", user))
    })
}

/// Result of a guarded `DROP USER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    Failed(String),
}

/// Drop the user inside a savepoint.
///
/// When the drop fails, typically because objects still depend on the user,
/// only the savepoint is rolled back and earlier work in the transaction is
/// kept.
pub fn user_delete(session: &mut dyn Session, user: &str) -> Result<Deletion> {
    session.savepoint(DELETE_SAVEPOINT)?;

    let drop = Statement::DropUser {
        user: user.to_string(),
    };
    match session.execute(&drop) {
        Ok(()) => {
            session.release(DELETE_SAVEPOINT)?;
            info!("dropped user {}", user);

            Ok(Deletion::Deleted)
        }
        Err(err) => {
            session.rollback_to(DELETE_SAVEPOINT)?;
            session.release(DELETE_SAVEPOINT)?;
            warn!("could not drop user {}: {}", user, err);

            Ok(Deletion::Failed(err.to_string()))
        }
    }
}
