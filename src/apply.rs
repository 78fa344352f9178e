use crate::config::{Config, State};
use crate::connection::DbConnection;
use crate::error::{Error, Result};
use crate::privilege::{apply_privileges, Direction, PrivilegeDemand};
use crate::role::{
    user_alter, user_create, user_delete, user_exists, Deletion, Password, RoleAttrFlags,
};
use crate::session::Session;
use ansi_term::Colour::{Green, Purple, Red};
use ascii_table::AsciiTable;
use log::info;
use serde::Serialize;
use std::path::Path;

/// Everything needed to reconcile one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub user: String,
    pub password: Option<Password>,
    pub no_password_changes: bool,
    pub expires: Option<String>,
    pub state: State,
    pub privileges: PrivilegeDemand,
    pub flags: RoleAttrFlags,
    /// Whether a user that cannot be dropped is an error
    pub fail_on_user: bool,
    /// Roll back instead of committing
    pub dry_run: bool,
}

/// Result of a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_removed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip)]
    pub steps: Vec<Step>,
}

/// One step taken, for the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: String,
    pub changed: bool,
}

impl Outcome {
    fn record(&mut self, action: &str, changed: bool) {
        self.changed |= changed;
        self.steps.push(Step {
            action: action.to_string(),
            changed,
        });
    }
}

/// Converge the user to the requested state.
///
/// `present` creates or alters the user, then grants the declared privileges.
/// `absent` revokes the declared privileges, then tries to drop the user; a
/// user that cannot be dropped is an error only with `fail_on_user`.
///
/// The transaction is committed once, at the end, and only if something
/// changed. On error nothing is committed.
pub fn reconcile(session: &mut dyn Session, request: &Request) -> Result<Outcome> {
    let user = request.user.as_str();
    let mut outcome = Outcome::default();
    let exists = user_exists(session, user)?;

    match request.state {
        State::Present => {
            if exists {
                let password = if request.no_password_changes {
                    None
                } else {
                    request.password.as_ref()
                };
                let changed = user_alter(
                    session,
                    user,
                    password,
                    request.expires.as_deref(),
                    &request.flags,
                )?;
                outcome.record("alter user", changed);
            } else {
                let password = request.password.as_ref().ok_or_else(|| {
                    Error::Config(format!("password is required when adding user {}", user))
                })?;
                let changed = user_create(
                    session,
                    user,
                    password,
                    request.expires.as_deref(),
                    &request.flags,
                )?;
                outcome.record("create user", changed);
            }

            let changed = apply_privileges(session, user, &request.privileges, Direction::Grant)?;
            outcome.record("grant privileges", changed);
        }
        State::Absent => {
            if !exists {
                info!("user {} does not exist, nothing to do", user);
                return Ok(outcome);
            }

            // privileges go first, a user holding them cannot be dropped
            let changed = apply_privileges(session, user, &request.privileges, Direction::Revoke)?;
            outcome.record("revoke privileges", changed);

            match user_delete(session, user)? {
                Deletion::Deleted => {
                    outcome.user_removed = Some(true);
                    outcome.record("drop user", true);
                }
                Deletion::Failed(reason) => {
                    if request.fail_on_user {
                        return Err(Error::DeletionFailed {
                            user: user.to_string(),
                            reason,
                        });
                    }
                    outcome.user_removed = Some(false);
                    outcome.failure = Some(reason);
                    outcome.record("drop user", false);
                }
            }
        }
    }

    if outcome.changed {
        if request.dry_run {
            session.rollback()?;
        } else {
            session.commit()?;
        }
    }

    Ok(outcome)
}

/// Read the declared state from the given path and apply it to the cluster.
/// If the dryrun flag is set, the changes are rolled back instead of committed.
pub fn apply(target: &Path, dryrun: bool) -> anyhow::Result<Outcome> {
    if target.is_dir() {
        return Err(anyhow::anyhow!(
            "{} is a directory, expected a declared-state file",
            target.display()
        ));
    }

    let config = Config::new(target)?;
    let mut request = config.user.to_request()?;
    request.dry_run = dryrun;

    info!(
        "Reconciling user {} to state {}{}",
        request.user,
        request.state,
        if dryrun { " (dry-run)" } else { "" }
    );

    let database = config.user.session_database();
    let mut conn = DbConnection::connect(&config.connection, database)?;
    let outcome = reconcile(&mut conn, &request)?;

    print_summary(&request, &outcome);

    Ok(outcome)
}

/// Print summary table
fn print_summary(request: &Request, outcome: &Outcome) {
    let mut summary = vec![vec![
        "User".to_string(),
        "Action".to_string(),
        "Status".to_string(),
    ]];
    summary.push(vec!["---".to_string(), "---".to_string(), "---".to_string()]);

    for step in &outcome.steps {
        let status = match (step.changed, request.dry_run) {
            (true, true) => Purple.paint("would change").to_string(),
            (true, false) => Green.paint("changed").to_string(),
            (false, _) if step.action == "drop user" => Red.paint("failed").to_string(),
            (false, _) => "no change".to_string(),
        };
        summary.push(vec![request.user.clone(), step.action.clone(), status]);
    }

    let term_width = term_size::dimensions().map(|(w, _)| w).unwrap_or(120);
    let mut table = AsciiTable::default();
    table.set_max_width(term_width.saturating_sub(5));

    info!("Summary:\n{}", table.format(summary));
}
