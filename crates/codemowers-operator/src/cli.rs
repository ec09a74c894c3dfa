//! Command line of the operator binary.
use std::time::Duration;

use clap::{Args, Parser};

use crate::{kind::KindName, namespace::WatchNamespace};

/// The commands of the operator.
#[derive(Debug, PartialEq, Eq, Parser)]
#[command(author, version, about)]
pub enum Command {
    /// Print CRD objects.
    Crd(CrdArguments),

    /// Run the operator.
    Run(RunArguments),
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct CrdArguments {
    /// Only print the CRDs of this kind, all kinds are printed by default
    #[arg(long, value_enum)]
    pub kind: Option<KindName>,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct RunArguments {
    /// The kind to reconcile
    #[arg(long, value_enum, env = "OPERATOR_KIND")]
    pub kind: KindName,

    /// Provides a specific namespace to watch (instead of watching all namespaces)
    #[arg(long, env, default_value = "")]
    pub watch_namespace: WatchNamespace,

    /// Log the changes instead of persisting them
    #[arg(long, env)]
    pub dry_run: bool,

    /// Maximum number of instances reconciled in parallel
    #[arg(long, env, default_value_t = 8)]
    pub concurrency: u16,

    /// Upper bound for every Kubernetes API call, e.g. `10s` or `1m`
    #[arg(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub api_timeout: Duration,

    /// bcrypt cost factor of `{bcryptHash}` secret values
    #[arg(long, env, default_value_t = bcrypt::DEFAULT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,
}
