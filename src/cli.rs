use std::path::PathBuf;
use structopt::StructOpt;

/// Converge a Postgres user's attributes and privileges to a declared state
#[derive(Debug, StructOpt)]
pub struct Cli {
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Apply a declared user state
    Apply {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,

        /// Dry run, report changes and roll them back
        #[structopt(short, long)]
        dryrun: bool,
    },

    /// Validate target file or directory
    Validate {
        /// The path to the file or directory to read
        #[structopt(short, long, default_value = ".", parse(from_os_str))]
        file: PathBuf,
    },

    /// Generate random password
    GenPass {
        /// The password length
        #[structopt(short, long, default_value = "16")]
        length: u8,
        /// The username, using to create md5 hash
        #[structopt(short, long)]
        username: Option<String>,
        /// The password, using to create md5 hash
        #[structopt(short, long)]
        password: Option<String>,
    },
}

// Parse the command line arguments
pub fn parse() -> Cli {
    Cli::from_args()
}
