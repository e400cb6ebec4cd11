use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::app::aws::{self, DbTokenInput};
use crate::app::cli::{CliArgs, Command, DbTokenArgs, TunnelArgs, UpArgs};
use crate::app::cmd::{Cmd, CmdError};
use crate::app::config::{self, Config, ConfigError, EnvConfig};
use crate::app::kube::{self, TunnelInput};

/// Region used when neither a flag nor the config file names one.
const DEFAULT_REGION: &str = "eu-west-2";

pub async fn run() -> ExitCode {
    init_tracing();
    let args = CliArgs::parse();
    match dispatch(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(failure_code(&err))
        }
    }
}

/// Our own notices go to stderr so that command results on stdout
/// (`sesh db-token`) stay machine-parsable. Child output is relayed
/// directly and never passes through tracing.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit with the failing child's own code; anything that is not a child
/// failure maps to 1.
fn failure_code(err: &anyhow::Error) -> u8 {
    let code = err.downcast_ref::<CmdError>().map_or(1, CmdError::exit_code);
    u8::try_from(code).unwrap_or(1)
}

async fn dispatch(args: CliArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let env = config.environment(args.env.as_deref())?;

    match args.command {
        Command::Up(up) => {
            let token = plan_bootstrap(up, &env)?.run().await?;
            write_token(&token).await?;
        }
        Command::Login(login) => {
            let profile = config::pick("profile", login.profile, env.profile)?;
            aws::sso_login(&profile).await?;
        }
        Command::Kubeconfig(kubeconfig) => {
            let profile = config::pick("profile", kubeconfig.profile, env.profile)?;
            let cluster = config::pick("cluster", kubeconfig.cluster_name, env.cluster)?;
            aws::update_kubeconfig(&profile, &cluster).await?;
        }
        Command::DbToken(db_token) => {
            let input = resolve_db(db_token, &env)?;
            let token = aws::generate_db_auth_token(&input).await?;
            write_token(&token).await?;
        }
        Command::Tunnel(tunnel) => {
            let input = resolve_tunnel(tunnel, &env)?;
            kube::port_forward(&input).await?;
        }
        Command::Status(status) => {
            let configured = env.tunnel.as_ref().and_then(|t| t.namespace.clone());
            let namespace = config::pick("namespace", status.namespace, configured)?;
            if kube::check_connectivity(&namespace).await? {
                info!("cluster is reachable, session looks good");
            } else {
                anyhow::bail!("cluster is unreachable; run `sesh up` to refresh the session");
            }
        }
    }
    Ok(())
}

/// The bootstrap sequence: login, kubeconfig, db token. Steps run strictly
/// in order; the first failure aborts the rest. The tunnel is never part of
/// this sequence.
struct Bootstrap {
    login: Cmd,
    kubeconfig: Cmd,
    db_token: Cmd,
}

impl Bootstrap {
    fn new(profile: &str, cluster: &str, db: &DbTokenInput) -> Self {
        Self {
            login: aws::sso_login_cmd(profile),
            kubeconfig: aws::update_kubeconfig_cmd(profile, cluster),
            db_token: aws::db_auth_token_cmd(db),
        }
    }

    async fn run(self) -> Result<String, CmdError> {
        aws::login_with(self.login).await?;
        self.kubeconfig.run().await?.ensure_success()?;
        let output = self.db_token.run().await?.ensure_success()?;
        Ok(output.stdout().to_string())
    }
}

fn plan_bootstrap(args: UpArgs, env: &EnvConfig) -> Result<Bootstrap, ConfigError> {
    let profile = config::pick("profile", args.profile, env.profile.clone())?;
    let cluster = config::pick("cluster", args.cluster_name, env.cluster.clone())?;
    let db = resolve_db(
        DbTokenArgs {
            profile: Some(profile.clone()),
            hostname: args.hostname,
            port: args.port,
            region: args.region,
            username: args.username,
        },
        env,
    )?;
    Ok(Bootstrap::new(&profile, &cluster, &db))
}

fn resolve_db(args: DbTokenArgs, env: &EnvConfig) -> Result<DbTokenInput, ConfigError> {
    let db = env.database.clone().unwrap_or_default();
    Ok(DbTokenInput {
        profile: config::pick("profile", args.profile, env.profile.clone())?,
        hostname: config::pick("database.hostname", args.hostname, db.hostname)?,
        port: config::pick_port("database.port", args.port, db.port)?,
        region: args
            .region
            .or_else(|| env.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        username: config::pick("database.username", args.username, db.username)?,
    })
}

fn resolve_tunnel(args: TunnelArgs, env: &EnvConfig) -> Result<TunnelInput, ConfigError> {
    let tunnel = env.tunnel.clone().unwrap_or_default();
    Ok(TunnelInput {
        service: config::pick("tunnel.service", args.service, tunnel.service)?,
        namespace: config::pick("tunnel.namespace", args.namespace, tunnel.namespace)?,
        local_port: config::pick_port("tunnel.local_port", args.local_port, tunnel.local_port)?,
        remote_port: config::pick_port(
            "tunnel.remote_port",
            args.remote_port,
            tunnel.remote_port,
        )?,
    })
}

async fn write_token(token: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(token.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
