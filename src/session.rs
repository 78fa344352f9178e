use crate::error::Result;
use crate::privilege::PrivilegeObject;
use crate::role::{Password, RoleAttrFlags, RoleAttributeSnapshot};
use std::collections::BTreeSet;

/// One open transaction against the target cluster.
///
/// Catalog reads always go to the server; nothing is cached between calls
/// since statements executed in between change the answer.
pub trait Session {
    fn role_exists(&mut self, user: &str) -> Result<bool>;

    /// Attribute snapshot of a role, `None` if it does not exist.
    fn role_attributes(&mut self, user: &str) -> Result<Option<RoleAttributeSnapshot>>;

    /// Raw `datacl` text of a database, `None` when it is NULL.
    fn database_acl(&mut self, database: &str) -> Result<Option<String>>;

    fn table_privileges(&mut self, user: &str, schema: &str, table: &str)
        -> Result<BTreeSet<String>>;

    fn execute(&mut self, statement: &Statement) -> Result<()>;

    fn savepoint(&mut self, name: &str) -> Result<()>;
    fn rollback_to(&mut self, name: &str) -> Result<()>;
    fn release(&mut self, name: &str) -> Result<()>;

    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

/// Statements the reconciler sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateUser {
        user: String,
        password: Password,
        expires: Option<String>,
        flags: RoleAttrFlags,
    },
    AlterUser {
        user: String,
        password: Option<Password>,
        expires: Option<String>,
        flags: RoleAttrFlags,
    },
    DropUser {
        user: String,
    },
    Grant {
        object: PrivilegeObject,
        privilege: String,
        user: String,
    },
    Revoke {
        object: PrivilegeObject,
        privilege: String,
        user: String,
    },
}

impl Statement {
    /// Render the statement with identifiers and literals quoted.
    ///
    /// ```sql
    /// GRANT privilege ON { DATABASE db | TABLE schema.table } TO user
    /// REVOKE privilege ON { DATABASE db | TABLE schema.table } FROM user
    /// ```
    pub fn to_sql(&self) -> String {
        match self {
            Statement::CreateUser {
                user,
                password,
                expires,
                flags,
            } => {
                let options = user_options(Some(password), expires.as_deref(), flags);
                format!("CREATE USER {} WITH {}", escape_identifier(user), options)
            }
            Statement::AlterUser {
                user,
                password,
                expires,
                flags,
            } => {
                let options = user_options(password.as_ref(), expires.as_deref(), flags);
                format!("ALTER USER {} WITH {}", escape_identifier(user), options)
            }
            Statement::DropUser { user } => format!("DROP USER {}", escape_identifier(user)),
            Statement::Grant {
                object,
                privilege,
                user,
            } => format!(
                "GRANT {} ON {} TO {}",
                privilege,
                object_sql(object),
                escape_identifier(user)
            ),
            Statement::Revoke {
                object,
                privilege,
                user,
            } => format!(
                "REVOKE {} ON {} FROM {}",
                privilege,
                object_sql(object),
                escape_identifier(user)
            ),
        }
    }
}

fn user_options(
    password: Option<&Password>,
    expires: Option<&str>,
    flags: &RoleAttrFlags,
) -> String {
    let mut options = vec![];
    if let Some(password) = password {
        let keyword = if password.is_encrypted() {
            "ENCRYPTED PASSWORD"
        } else {
            "PASSWORD"
        };
        options.push(format!("{} {}", keyword, escape_literal(password.as_str())));
    }
    if let Some(expires) = expires {
        options.push(format!("VALID UNTIL {}", escape_literal(expires)));
    }
    if !flags.is_empty() {
        options.push(flags.to_string());
    }

    options.join(" ")
}

fn object_sql(object: &PrivilegeObject) -> String {
    match object {
        PrivilegeObject::Database(database) => {
            format!("DATABASE {}", escape_identifier(database))
        }
        PrivilegeObject::Table { schema, table } => format!(
            "TABLE {}.{}",
            escape_identifier(schema),
            escape_identifier(table)
        ),
    }
}

/// Quote an identifier, doubling embedded double quotes.
pub fn escape_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn escape_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
