//! Privilege demands and their application.
//!
//! A demand is written as `/`-separated clauses. A clause with a `:` targets a
//! table, anything else targets the configured database:
//!
//! ```text
//! CONNECT,TEMPORARY/products:SELECT,INSERT/sales.orders:ALL
//! ```
//!
//! When two clauses name the same object the last one wins.

pub mod acl;
mod object;

pub use object::PrivilegeObject;

use crate::error::{Error, Result};
use crate::session::Session;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Schema used for tables named without one.
pub const DEFAULT_SCHEMA: &str = "public";

const DATABASE_PRIVILEGES: &[&str] = &["CREATE", "CONNECT", "TEMPORARY", "TEMP", "ALL"];
const TABLE_PRIVILEGES: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
    "ALL",
];

/// Declared privileges, keyed by object name then privilege.
///
/// Table names are always schema qualified (`public.products`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeDemand {
    pub database: BTreeMap<String, BTreeSet<String>>,
    pub table: BTreeMap<String, BTreeSet<String>>,
}

impl PrivilegeDemand {
    /// Parse a privilege string against the configured database.
    ///
    /// A missing or blank string gives an empty demand. A non-empty string
    /// without a database is a configuration error.
    pub fn parse(spec: Option<&str>, database: Option<&str>) -> Result<Self> {
        let spec = match spec.map(str::trim) {
            Some(spec) if !spec.is_empty() => spec,
            _ => return Ok(Self::default()),
        };

        let database = database
            .map(str::trim)
            .filter(|db| !db.is_empty())
            .ok_or_else(|| Error::Config("privileges require a database (db)".to_string()))?;

        let mut demand = Self::default();
        for clause in spec.split('/').map(str::trim).filter(|c| !c.is_empty()) {
            match clause.split_once(':') {
                Some((object, privileges)) => {
                    let object = object.trim();
                    if object.is_empty() {
                        return Err(Error::Config(format!(
                            "table name missing in privilege clause `{}`",
                            clause
                        )));
                    }
                    let name = PrivilegeObject::table(object).name();
                    let privileges = parse_privileges(privileges, TABLE_PRIVILEGES, &name)?;
                    demand.table.insert(name, privileges);
                }
                None => {
                    let privileges = parse_privileges(clause, DATABASE_PRIVILEGES, database)?;
                    demand.database.insert(database.to_string(), privileges);
                }
            }
        }

        debug!("parsed privileges `{}`: {}", spec, demand);

        Ok(demand)
    }

    pub fn is_empty(&self) -> bool {
        self.database.is_empty() && self.table.is_empty()
    }

    /// Every declared object with its privileges, databases first.
    pub fn objects(&self) -> impl Iterator<Item = (PrivilegeObject, &BTreeSet<String>)> {
        let databases = self
            .database
            .iter()
            .map(|(name, privs)| (PrivilegeObject::Database(name.clone()), privs));
        let tables = self
            .table
            .iter()
            .map(|(name, privs)| (PrivilegeObject::table(name), privs));

        databases.chain(tables)
    }
}

impl fmt::Display for PrivilegeDemand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let clauses = self
            .objects()
            .map(|(object, privs)| {
                format!(
                    "{}:{}",
                    object,
                    privs.iter().cloned().collect::<Vec<_>>().join(",")
                )
            })
            .collect::<Vec<_>>();

        write!(f, "[{}]", clauses.join(", "))
    }
}

fn parse_privileges(list: &str, valid: &[&str], object: &str) -> Result<BTreeSet<String>> {
    let mut privileges = BTreeSet::new();
    for privilege in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let privilege = privilege.to_uppercase();
        if !valid.contains(&privilege.as_str()) {
            return Err(Error::Config(format!(
                "invalid privilege {} on {}, expected one of: {:?}",
                privilege, object, valid
            )));
        }
        privileges.insert(privilege);
    }

    Ok(privileges)
}

/// Whether a batch adds or removes privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Grant,
    Revoke,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Grant => write!(f, "grant"),
            Direction::Revoke => write!(f, "revoke"),
        }
    }
}

/// Grant or revoke every privilege in the demand, one at a time.
///
/// Returns true if at least one operation changed the user's privileges. Every
/// operation runs even when earlier ones were no-ops.
pub fn apply_privileges(
    session: &mut dyn Session,
    user: &str,
    demand: &PrivilegeDemand,
    direction: Direction,
) -> Result<bool> {
    let mut changed = false;
    for (object, privileges) in demand.objects() {
        for privilege in privileges {
            let effective = match direction {
                Direction::Grant => object.grant(session, user, privilege)?,
                Direction::Revoke => object.revoke(session, user, privilege)?,
            };
            debug!(
                "{} {} on {} for {}: changed = {}",
                direction, privilege, object, user, effective
            );
            changed |= effective;
        }
    }

    Ok(changed)
}
