use super::{acl, DEFAULT_SCHEMA};
use crate::error::Result;
use crate::session::{Session, Statement};
use std::collections::BTreeSet;
use std::fmt;

/// An object privileges can be granted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeObject {
    Database(String),
    Table { schema: String, table: String },
}

impl PrivilegeObject {
    /// Resolve `schema.table` or a bare `table` in the default schema.
    pub fn table(name: &str) -> Self {
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (schema.trim(), table.trim()),
            None => (DEFAULT_SCHEMA, name.trim()),
        };

        PrivilegeObject::Table {
            schema: schema.to_string(),
            table: table.to_string(),
        }
    }

    /// Object name as used in privilege demands.
    pub fn name(&self) -> String {
        match self {
            PrivilegeObject::Database(database) => database.clone(),
            PrivilegeObject::Table { schema, table } => format!("{}.{}", schema, table),
        }
    }

    /// Privileges the user currently holds on this object, read fresh.
    pub fn privileges(&self, session: &mut dyn Session, user: &str) -> Result<BTreeSet<String>> {
        match self {
            PrivilegeObject::Database(database) => {
                let datacl = session.database_acl(database)?;
                Ok(acl::database_privileges(datacl.as_deref(), user))
            }
            PrivilegeObject::Table { schema, table } => {
                session.table_privileges(user, schema, table)
            }
        }
    }

    /// Grant one privilege, true if the user ends up holding more than before.
    ///
    /// Granting a privilege that is already held succeeds without effect, so the
    /// result comes from re-reading the catalog rather than from the statement.
    pub fn grant(&self, session: &mut dyn Session, user: &str, privilege: &str) -> Result<bool> {
        let before = self.privileges(session, user)?;
        session.execute(&Statement::Grant {
            object: self.clone(),
            privilege: privilege.to_string(),
            user: user.to_string(),
        })?;
        let after = self.privileges(session, user)?;

        Ok(after.len() > before.len())
    }

    /// Revoke one privilege, true if the user ends up holding fewer than before.
    pub fn revoke(&self, session: &mut dyn Session, user: &str, privilege: &str) -> Result<bool> {
        let before = self.privileges(session, user)?;
        session.execute(&Statement::Revoke {
            object: self.clone(),
            privilege: privilege.to_string(),
            user: user.to_string(),
        })?;
        let after = self.privileges(session, user)?;

        Ok(after.len() < before.len())
    }
}

impl fmt::Display for PrivilegeObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrivilegeObject::Database(_) => write!(f, "database {}", self.name()),
            PrivilegeObject::Table { .. } => write!(f, "table {}", self.name()),
        }
    }
}
