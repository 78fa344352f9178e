use anyhow::{Context, Result};
use pguser::apply::apply;
use pguser::cli::{self, Command};
use pguser::gen::gen_pass;
use pguser::validate::validate_target;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    match cli::parse().cmd {
        Command::Apply { file, dryrun } => {
            let outcome = apply(&file, dryrun)?;
            let report = serde_yaml::to_string(&outcome).context("could not render outcome")?;
            print!("{}", report);
        }

        Command::Validate { file } => validate_target(&file)?,

        Command::GenPass {
            length,
            username,
            password,
        } => gen_pass(length, username.as_deref(), password.as_deref()),
    }

    Ok(())
}
