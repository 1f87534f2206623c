pub(crate) use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "banking-core",
    author,
    version,
    about = "A small core-banking ledger engine",
    long_about = None,
    after_help = "OUTPUT:\n    Final account state is printed to stdout in CSV format.\n    Use shell redirection to save to a file:\n\n    banking-core operations.csv > accounts.csv"
)]
pub struct Args {
    /// Path to the input operations CSV file
    #[arg(
        index = 1,
        value_name = "FILE",
        help = "Input CSV file with columns: op, user, account, to, kind, currency, amount"
    )]
    pub input_file: PathBuf,

    /// Also write the committed transfer journal to this file
    #[arg(long, value_name = "FILE")]
    pub transfers: Option<PathBuf>,
}
