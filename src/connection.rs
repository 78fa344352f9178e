use crate::config::Connection;
use crate::error::{Error, Result};
use crate::role::RoleAttributeSnapshot;
use crate::session::{escape_identifier, Session, Statement};
use log::{debug, info};
use postgres::{Client, NoTls};
use std::collections::BTreeSet;

/// A postgres connection holding one open transaction.
///
/// The transaction starts on connect. Dropping the connection without
/// `commit` discards everything.
pub struct DbConnection {
    connection_info: String,
    client: Client,
}

impl DbConnection {
    /// Connect to the given database (or the connection's default) and open
    /// the transaction.
    pub fn connect(connection: &Connection, database: Option<&str>) -> Result<Self> {
        let connection_info = connection.describe(database);
        let config = connection.pg_config(database)?;
        let client = config
            .connect(NoTls)
            .map_err(|e| Error::Connection(format!("{}: {}", connection_info, e)))?;

        info!("Connected to database: {}", connection_info);

        let mut conn = Self {
            connection_info,
            client,
        };
        conn.batch("BEGIN")?;

        Ok(conn)
    }

    /// Returns the connection_info
    pub fn connection_info(&self) -> &str {
        &self.connection_info
    }

    fn batch(&mut self, sql: &str) -> Result<()> {
        debug!("{}", sql);
        self.client.batch_execute(sql)?;

        Ok(())
    }
}

impl Session for DbConnection {
    fn role_exists(&mut self, user: &str) -> Result<bool> {
        let sql = "SELECT 1 FROM pg_roles WHERE rolname = $1";
        let row = self.client.query_opt(sql, &[&user])?;

        Ok(row.is_some())
    }

    fn role_attributes(&mut self, user: &str) -> Result<Option<RoleAttributeSnapshot>> {
        let sql = "
            SELECT
              rolpassword,
              rolsuper,
              rolinherit,
              rolcreaterole,
              rolcreatedb,
              rolcanlogin,
              rolreplication,
              rolvaliduntil::text
            FROM pg_authid
            WHERE rolname = $1
        ";

        let snapshot = self
            .client
            .query_opt(sql, &[&user])?
            .map(|row| RoleAttributeSnapshot {
                password: row.get(0),
                superuser: row.get(1),
                inherit: row.get(2),
                createrole: row.get(3),
                createdb: row.get(4),
                canlogin: row.get(5),
                replication: row.get(6),
                valid_until: row.get(7),
            });

        Ok(snapshot)
    }

    fn database_acl(&mut self, database: &str) -> Result<Option<String>> {
        let sql = "SELECT datacl::text FROM pg_database WHERE datname = $1";
        let row = self.client.query_opt(sql, &[&database])?;

        Ok(row.and_then(|row| row.get(0)))
    }

    fn table_privileges(
        &mut self,
        user: &str,
        schema: &str,
        table: &str,
    ) -> Result<BTreeSet<String>> {
        let sql = "
            SELECT privilege_type::text
            FROM information_schema.role_table_grants
            WHERE grantee::text = $1
              AND table_schema::text = $2
              AND table_name::text = $3
        ";

        let privileges = self
            .client
            .query(sql, &[&user, &schema, &table])?
            .iter()
            .map(|row| row.get::<_, String>(0))
            .collect();

        Ok(privileges)
    }

    fn execute(&mut self, statement: &Statement) -> Result<()> {
        let sql = statement.to_sql();
        match statement {
            // keep passwords out of the logs
            Statement::CreateUser { user, .. } => debug!("CREATE USER {} ...", user),
            Statement::AlterUser { user, .. } => debug!("ALTER USER {} ...", user),
            _ => debug!("{}", sql),
        }
        self.client.batch_execute(&sql)?;

        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.batch(&format!("SAVEPOINT {}", escape_identifier(name)))
    }

    fn rollback_to(&mut self, name: &str) -> Result<()> {
        self.batch(&format!("ROLLBACK TO SAVEPOINT {}", escape_identifier(name)))
    }

    fn release(&mut self, name: &str) -> Result<()> {
        self.batch(&format!("RELEASE SAVEPOINT {}", escape_identifier(name)))
    }

    fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK")
    }
}
