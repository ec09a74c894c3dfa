use clap::Parser;
use codemowers_operator::{
    cli::{Command, CrdArguments, RunArguments},
    client::{self, Client},
    controller, crd, kind,
    logging::{LOG_ENV, initialize_logging},
    secret::PasswordHasher,
    yaml,
};
use snafu::{ResultExt, Snafu};

const APP_NAME: &str = "codemowers-operator";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to print CRDs"))]
    PrintCrds { source: yaml::Error },

    #[snafu(display("failed to create Kubernetes client"))]
    InitializeClient { source: client::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    match Command::parse() {
        Command::Crd(CrdArguments { kind: only }) => {
            let crds: Vec<_> = match only {
                Some(name) => crd::crds(name.kind()),
                None => kind::all().into_iter().flat_map(crd::crds).collect(),
            };
            yaml::print(&crds).context(PrintCrdsSnafu)
        }
        Command::Run(RunArguments {
            kind,
            watch_namespace,
            dry_run,
            concurrency,
            api_timeout,
            bcrypt_cost,
        }) => {
            initialize_logging(LOG_ENV, APP_NAME);
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                %kind,
                "starting {APP_NAME}"
            );

            let client = client::initialize_client()
                .await
                .context(InitializeClientSnafu)?;
            let client = Client::new(client, api_timeout, PasswordHasher::new(bcrypt_cost), dry_run);

            controller::run(client, kind.kind(), &watch_namespace, concurrency).await;
            Ok(())
        }
    }
}
