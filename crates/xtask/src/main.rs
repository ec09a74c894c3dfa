use clap::{Parser, Subcommand};
use snafu::{ResultExt, Snafu};

mod crd;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to generate CRDs"))]
    Crd { source: crd::Error },
}

#[derive(Debug, Parser)]
enum Command {
    #[command(subcommand)]
    Crd(CrdCommand),
}

#[derive(Debug, Subcommand)]
enum CrdCommand {
    /// Writes the CRDs of every kind to `crates/codemowers-operator/crds`.
    Generate,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let command = Command::parse();

    match command {
        Command::Crd(crd_command) => match crd_command {
            CrdCommand::Generate => crd::generate().context(CrdSnafu),
        },
    }
}
