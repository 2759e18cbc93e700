use clap::{Parser, Subcommand};
use resource_builders::logging;
use snafu::{ResultExt, Snafu};

mod crd;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to generate CRD previews"))]
    Crd { source: crd::Error },
}

#[derive(Debug, Parser)]
enum Command {
    #[command(subcommand)]
    Crd(CrdCommand),
}

#[derive(Debug, Subcommand)]
enum CrdCommand {
    /// Writes the CRDs to the `crds` directory of the resource-builders crate.
    Preview,

    /// Prints the CRDs to stdout.
    Print,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    logging::initialize_logging("XTASK_LOG", "xtask").context(InitializeLoggingSnafu)?;

    let command = Command::parse();

    match command {
        Command::Crd(crd_command) => match crd_command {
            CrdCommand::Preview => crd::generate_preview().context(CrdSnafu),
            CrdCommand::Print => crd::print().context(CrdSnafu),
        },
    }
}
