//! In-memory session used by the unit tests.
//!
//! Models just enough of a cluster: roles with their attributes, database
//! ACLs, table grants, savepoints and roles that own objects (which makes
//! `DROP USER` fail, as does any privilege still held).

use crate::error::{Error, Result};
use crate::privilege::PrivilegeObject;
use crate::role::RoleAttributeSnapshot;
use crate::session::{Session, Statement};
use std::collections::{BTreeMap, BTreeSet};

const TABLE_PRIVILEGES: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
];

#[derive(Debug, Clone, Default, PartialEq)]
struct Cluster {
    roles: BTreeMap<String, RoleAttributeSnapshot>,
    // database -> grantee -> acl letters
    databases: BTreeMap<String, BTreeMap<String, BTreeSet<char>>>,
    // (schema, table) -> grantee -> privileges
    tables: BTreeMap<(String, String), BTreeMap<String, BTreeSet<String>>>,
    owners: BTreeSet<String>,
}

#[derive(Debug)]
pub struct MemorySession {
    cluster: Cluster,
    committed: Cluster,
    savepoints: Vec<(String, Cluster)>,
    /// Every statement sent through `execute`, successful or not
    pub log: Vec<Statement>,
    /// Number of catalog reads
    pub reads: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

impl MemorySession {
    /// A cluster with database `acme` and table `public.products`.
    pub fn new() -> Self {
        let mut cluster = Cluster::default();
        let mut acme = BTreeMap::new();
        acme.insert(String::new(), "Tc".chars().collect());
        acme.insert("postgres".to_string(), "CTc".chars().collect());
        cluster.databases.insert("acme".to_string(), acme);
        cluster.tables.insert(
            ("public".to_string(), "products".to_string()),
            BTreeMap::new(),
        );

        Self {
            committed: cluster.clone(),
            cluster,
            savepoints: vec![],
            log: vec![],
            reads: 0,
            commits: 0,
            rollbacks: 0,
        }
    }

    pub fn add_role(&mut self, user: &str) {
        self.cluster.roles.insert(
            user.to_string(),
            RoleAttributeSnapshot {
                inherit: true,
                canlogin: true,
                ..Default::default()
            },
        );
    }

    /// Database with a NULL acl.
    pub fn add_database(&mut self, database: &str) {
        self.cluster
            .databases
            .insert(database.to_string(), BTreeMap::new());
    }

    pub fn add_table(&mut self, schema: &str, table: &str) {
        self.cluster
            .tables
            .insert((schema.to_string(), table.to_string()), BTreeMap::new());
    }

    /// Mark the user as owning objects, so it cannot be dropped.
    pub fn add_owner(&mut self, user: &str) {
        self.cluster.owners.insert(user.to_string());
    }

    pub fn grant_table(&mut self, user: &str, schema: &str, table: &str, privilege: &str) {
        self.cluster
            .tables
            .entry((schema.to_string(), table.to_string()))
            .or_default()
            .entry(user.to_string())
            .or_default()
            .insert(privilege.to_string());
    }

    pub fn grant_database(&mut self, user: &str, database: &str, letter: char) {
        self.cluster
            .databases
            .entry(database.to_string())
            .or_default()
            .entry(user.to_string())
            .or_default()
            .insert(letter);
    }

    pub fn has_role(&self, user: &str) -> bool {
        self.cluster.roles.contains_key(user)
    }

    pub fn table_grants(&self, user: &str, schema: &str, table: &str) -> BTreeSet<String> {
        self.cluster
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .and_then(|grants| grants.get(user))
            .cloned()
            .unwrap_or_default()
    }

    pub fn database_grants(&self, database: &str, user: &str) -> BTreeSet<char> {
        self.cluster
            .databases
            .get(database)
            .and_then(|grants| grants.get(user))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the committed state has the role.
    pub fn committed_role(&self, user: &str) -> bool {
        self.committed.roles.contains_key(user)
    }

    pub fn savepoints(&self) -> Vec<String> {
        self.savepoints.iter().map(|(name, _)| name.clone()).collect()
    }

    fn holds_privileges(&self, user: &str) -> bool {
        let on_database = self
            .cluster
            .databases
            .values()
            .any(|grants| grants.get(user).map_or(false, |l| !l.is_empty()));
        let on_table = self
            .cluster
            .tables
            .values()
            .any(|grants| grants.get(user).map_or(false, |p| !p.is_empty()));

        on_database || on_table
    }

    fn role_mut(&mut self, user: &str) -> Result<&mut RoleAttributeSnapshot> {
        self.cluster
            .roles
            .get_mut(user)
            .ok_or_else(|| Error::Rejected(format!("role \"{}\" does not exist", user)))
    }

    fn apply(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::CreateUser {
                user,
                password,
                expires,
                flags,
            } => {
                if self.has_role(user) {
                    return Err(Error::Rejected(format!("role \"{}\" already exists", user)));
                }
                self.add_role(user);
                let role = self.role_mut(user)?;
                role.password = Some(password.as_str().to_string());
                role.valid_until = expires.clone();
                set_flags(role, flags.iter())
            }
            Statement::AlterUser {
                user,
                password,
                expires,
                flags,
            } => {
                let role = self.role_mut(user)?;
                if let Some(password) = password {
                    role.password = Some(password.as_str().to_string());
                }
                if let Some(expires) = expires {
                    role.valid_until = Some(expires.clone());
                }
                set_flags(role, flags.iter())
            }
            Statement::DropUser { user } => {
                if !self.has_role(user) {
                    return Err(Error::Rejected(format!("role \"{}\" does not exist", user)));
                }
                if self.cluster.owners.contains(user) || self.holds_privileges(user) {
                    return Err(Error::Rejected(format!(
                        "role \"{}\" cannot be dropped because some objects depend on it",
                        user
                    )));
                }
                self.cluster.roles.remove(user);
                Ok(())
            }
            Statement::Grant {
                object,
                privilege,
                user,
            } => self.change_privilege(object, privilege, user, true),
            Statement::Revoke {
                object,
                privilege,
                user,
            } => self.change_privilege(object, privilege, user, false),
        }
    }

    fn change_privilege(
        &mut self,
        object: &PrivilegeObject,
        privilege: &str,
        user: &str,
        grant: bool,
    ) -> Result<()> {
        if !self.has_role(user) {
            return Err(Error::Rejected(format!("role \"{}\" does not exist", user)));
        }

        match object {
            PrivilegeObject::Database(database) => {
                let letters: Vec<char> = match privilege {
                    "CREATE" => vec!['C'],
                    "TEMPORARY" | "TEMP" => vec!['T'],
                    "CONNECT" => vec!['c'],
                    "ALL" => vec!['C', 'T', 'c'],
                    _ => return Err(invalid_privilege(privilege, "database")),
                };
                let grants = self.cluster.databases.get_mut(database).ok_or_else(|| {
                    Error::Rejected(format!("database \"{}\" does not exist", database))
                })?;
                let held = grants.entry(user.to_string()).or_default();
                for letter in letters {
                    if grant {
                        held.insert(letter);
                    } else {
                        held.remove(&letter);
                    }
                }
                if held.is_empty() {
                    grants.remove(user);
                }
            }
            PrivilegeObject::Table { schema, table } => {
                let privileges: Vec<&str> = match privilege {
                    "ALL" => TABLE_PRIVILEGES.to_vec(),
                    p if TABLE_PRIVILEGES.contains(&p) => vec![p],
                    _ => return Err(invalid_privilege(privilege, "table")),
                };
                let grants = self
                    .cluster
                    .tables
                    .get_mut(&(schema.clone(), table.clone()))
                    .ok_or_else(|| {
                        Error::Rejected(format!("relation \"{}.{}\" does not exist", schema, table))
                    })?;
                let held = grants.entry(user.to_string()).or_default();
                for privilege in privileges {
                    if grant {
                        held.insert(privilege.to_string());
                    } else {
                        held.remove(privilege);
                    }
                }
                if held.is_empty() {
                    grants.remove(user);
                }
            }
        }

        Ok(())
    }
}

fn invalid_privilege(privilege: &str, class: &str) -> Error {
    Error::Rejected(format!("invalid privilege type {} for {}", privilege, class))
}

fn set_flags<'a>(
    role: &mut RoleAttributeSnapshot,
    flags: impl Iterator<Item = &'a str>,
) -> Result<()> {
    for flag in flags {
        let (bare, value) = match flag.strip_prefix("NO") {
            Some(bare) => (bare, false),
            None => (flag, true),
        };
        match bare {
            "SUPERUSER" => role.superuser = value,
            "INHERIT" => role.inherit = value,
            "CREATEROLE" => role.createrole = value,
            "CREATEDB" => role.createdb = value,
            "LOGIN" => role.canlogin = value,
            "REPLICATION" => role.replication = value,
            _ => return Err(Error::Rejected(format!("unrecognized role option {}", flag))),
        }
    }

    Ok(())
}

/// Render an acl the way `datacl::text` does, quoting unusual names.
fn render_acl(grants: &BTreeMap<String, BTreeSet<char>>) -> String {
    let items = grants
        .iter()
        .map(|(grantee, letters)| {
            let letters = letters.iter().collect::<String>();
            let plain = grantee
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if plain {
                format!("{}={}/postgres", grantee, letters)
            } else {
                let item = format!("\"{}\"={}/postgres", grantee.replace('"', "\"\""), letters);
                format!("\"{}\"", item.replace('"', "\\\""))
            }
        })
        .collect::<Vec<_>>();

    format!("{{{}}}", items.join(","))
}

impl Session for MemorySession {
    fn role_exists(&mut self, user: &str) -> Result<bool> {
        self.reads += 1;
        Ok(self.has_role(user))
    }

    fn role_attributes(&mut self, user: &str) -> Result<Option<RoleAttributeSnapshot>> {
        self.reads += 1;
        Ok(self.cluster.roles.get(user).cloned())
    }

    fn database_acl(&mut self, database: &str) -> Result<Option<String>> {
        self.reads += 1;
        let grants = self
            .cluster
            .databases
            .get(database)
            .ok_or_else(|| Error::Rejected(format!("database \"{}\" does not exist", database)))?;

        if grants.is_empty() {
            Ok(None)
        } else {
            Ok(Some(render_acl(grants)))
        }
    }

    fn table_privileges(
        &mut self,
        user: &str,
        schema: &str,
        table: &str,
    ) -> Result<BTreeSet<String>> {
        self.reads += 1;
        Ok(self.table_grants(user, schema, table))
    }

    fn execute(&mut self, statement: &Statement) -> Result<()> {
        self.log.push(statement.clone());
        self.apply(statement)
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoints.push((name.to_string(), self.cluster.clone()));
        Ok(())
    }

    fn rollback_to(&mut self, name: &str) -> Result<()> {
        let position = self.position(name)?;
        self.savepoints.truncate(position + 1);
        self.cluster = self.savepoints[position].1.clone();
        Ok(())
    }

    fn release(&mut self, name: &str) -> Result<()> {
        let position = self.position(name)?;
        self.savepoints.truncate(position);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        self.savepoints.clear();
        self.committed = self.cluster.clone();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        self.savepoints.clear();
        self.cluster = self.committed.clone();
        Ok(())
    }
}

impl MemorySession {
    fn position(&self, name: &str) -> Result<usize> {
        self.savepoints
            .iter()
            .rposition(|(saved, _)| saved == name)
            .ok_or_else(|| Error::Rejected(format!("savepoint \"{}\" does not exist", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::acl;

    #[test]
    fn test_rendered_acl_decodes() {
        let mut session = MemorySession::new();
        session.add_role("web app");
        session.grant_database("web app", "acme", 'c');

        let datacl = session.database_acl("acme").unwrap();
        assert_eq!(
            acl::database_privileges(datacl.as_deref(), "web app"),
            ["CONNECT".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_savepoint_rollback() {
        let mut session = MemorySession::new();
        session.savepoint("sp").unwrap();
        session.add_role("django");
        session.rollback_to("sp").unwrap();
        session.release("sp").unwrap();

        assert!(!session.has_role("django"));
        assert!(session.savepoints().is_empty());
        assert!(session.release("sp").is_err());
    }
}
