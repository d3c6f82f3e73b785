//! Command surface: a top-level `clap::Parser` whose subcommands map
//! directly onto `certbus-acme::Manager`'s operations.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "certbus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Certificate lifecycle operations.
    #[command(subcommand)]
    Cert(CertCommand),

    /// Encrypted configuration read/write.
    #[command(subcommand)]
    Conf(ConfCommand),

    /// Demo HTTPS server on :8443 that resolves certificates from CertBus.
    #[command(name = "example-server")]
    ExampleServer,
}

#[derive(Subcommand)]
pub enum CertCommand {
    /// List all managed certificates.
    Ls,

    /// Issue a new certificate.
    Mk {
        domain: String,

        /// Issue for `*.<domain>` and `<domain>`.
        #[arg(long, conflicts_with = "subdomain")]
        wildcard: bool,

        /// Issue only for `domain` itself, no additional SAN.
        #[arg(long)]
        subdomain: bool,

        /// Use DNS-01 (true, default) or HTTP-01 (false).
        #[arg(long, default_value_t = true)]
        dns: bool,
    },

    /// Print one certificate as JSON.
    Cat { id: String },

    /// List certificates due for renewal at a given instant (default: now).
    Renewable {
        /// `YYYY-MM-DD`; defaults to the current time.
        date: Option<String>,

        /// Renew the first renewable certificate instead of just listing.
        #[arg(short = 'r', long = "renew-first")]
        renew_first: bool,
    },

    /// Force-renew one certificate by id.
    Renew { id: String },

    /// Remove a certificate by id.
    Rm { id: String },
}

#[derive(Subcommand)]
pub enum ConfCommand {
    /// Read a JSON configuration document from stdin and publish it.
    Update,

    /// Print the current decrypted configuration as JSON.
    Display,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
