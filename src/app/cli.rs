use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the JSON config file holding named environments
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named environment from the config file to take defaults from
    #[clap(short, long, global = true)]
    pub env: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bootstrap the session: SSO login, kubeconfig update, then print a
    /// database auth token
    Up(UpArgs),
    /// Authenticate the local session via AWS SSO
    Login(LoginArgs),
    /// Merge the EKS cluster's connection config into the local kubeconfig
    Kubeconfig(KubeconfigArgs),
    /// Print a short-lived IAM auth token for the database
    DbToken(DbTokenArgs),
    /// Port-forward the in-cluster database proxy to a local port
    Tunnel(TunnelArgs),
    /// Check whether the current session still reaches the cluster
    Status(StatusArgs),
}

#[derive(Args)]
pub struct UpArgs {
    /// AWS profile to use for authentication
    #[clap(short, long)]
    pub profile: Option<String>,

    /// Name of the EKS Kubernetes cluster to get credentials for
    #[clap(short, long)]
    pub cluster_name: Option<String>,

    /// Name of the AWS region the database is in
    #[clap(short, long)]
    pub region: Option<String>,

    /// Hostname of the database endpoint
    #[clap(long)]
    pub hostname: Option<String>,

    /// Port of the database endpoint
    #[clap(long)]
    pub port: Option<u16>,

    /// Database user to mint the auth token for
    #[clap(short, long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct LoginArgs {
    /// AWS profile to use for authentication
    #[clap(short, long)]
    pub profile: Option<String>,
}

#[derive(Args)]
pub struct KubeconfigArgs {
    /// AWS profile to use for authentication
    #[clap(short, long)]
    pub profile: Option<String>,

    /// Name of the EKS Kubernetes cluster to get credentials for
    #[clap(short, long)]
    pub cluster_name: Option<String>,
}

#[derive(Args)]
pub struct DbTokenArgs {
    /// AWS profile to use for authentication
    #[clap(short, long)]
    pub profile: Option<String>,

    /// Hostname of the database endpoint
    #[clap(long)]
    pub hostname: Option<String>,

    /// Port of the database endpoint
    #[clap(long)]
    pub port: Option<u16>,

    /// Name of the AWS region the database is in
    #[clap(short, long)]
    pub region: Option<String>,

    /// Database user to mint the auth token for
    #[clap(short, long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct TunnelArgs {
    /// Cluster-internal service to forward, without the `svc/` prefix
    #[clap(short, long)]
    pub service: Option<String>,

    /// Namespace the service lives in
    #[clap(short, long)]
    pub namespace: Option<String>,

    /// Local port to listen on
    #[clap(long)]
    pub local_port: Option<u16>,

    /// Remote port on the service
    #[clap(long)]
    pub remote_port: Option<u16>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Namespace to probe with a pod listing
    #[clap(short, long)]
    pub namespace: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_the_bootstrap_command() {
        let args = CliArgs::try_parse_from([
            "sesh", "--env", "dev", "up", "--profile", "dev-profile", "--port", "3306",
        ])
        .unwrap();
        assert_eq!(args.env.as_deref(), Some("dev"));
        match args.command {
            Command::Up(up) => {
                assert_eq!(up.profile.as_deref(), Some("dev-profile"));
                assert_eq!(up.port, Some(3306));
                assert!(up.cluster_name.is_none());
            }
            _ => panic!("expected the up subcommand"),
        }
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let args = CliArgs::try_parse_from(["sesh", "login", "--env", "prod"]).unwrap();
        assert_eq!(args.env.as_deref(), Some("prod"));
    }

    #[test]
    fn tunnel_ports_parse_as_numbers() {
        let args = CliArgs::try_parse_from([
            "sesh",
            "tunnel",
            "--service",
            "db-proxy",
            "--namespace",
            "backend",
            "--local-port",
            "3306",
            "--remote-port",
            "3306",
        ])
        .unwrap();
        match args.command {
            Command::Tunnel(tunnel) => {
                assert_eq!(tunnel.service.as_deref(), Some("db-proxy"));
                assert_eq!(tunnel.local_port, Some(3306));
            }
            _ => panic!("expected the tunnel subcommand"),
        }
    }
}
