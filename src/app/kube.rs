//! The `kubectl` invocations: the database tunnel and the connectivity
//! probe. Both assume the kubeconfig written by `aws eks update-kubeconfig`.

use tracing::info;

use crate::app::cmd::{Cmd, CmdError};

/// Where the tunnel attaches: a cluster-internal service fronting the
/// database, forwarded to a local port.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelInput {
    pub service: String,
    pub namespace: String,
    pub local_port: u16,
    pub remote_port: u16,
}

pub fn port_forward_cmd(input: &TunnelInput) -> Cmd {
    let target = format!("svc/{}", input.service);
    let ports = format!("{}:{}", input.local_port, input.remote_port);
    Cmd::new(
        "kubectl",
        [
            "port-forward",
            target.as_str(),
            "-n",
            input.namespace.as_str(),
            ports.as_str(),
        ],
    )
}

pub fn get_pods_cmd(namespace: &str) -> Cmd {
    Cmd::new("kubectl", ["get", "-n", namespace, "pods"])
}

/// Hold the tunnel open in the foreground until the child exits or the
/// operator interrupts us. Ctrl-C drops the run future, which kills the
/// child; the tunnel going down on its own is surfaced as the child's
/// failure.
pub async fn port_forward(input: &TunnelInput) -> Result<(), CmdError> {
    tokio::select! {
        result = port_forward_cmd(input).run() => {
            result?.ensure_success()?;
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, closing tunnel");
            Ok(())
        }
    }
}

/// Probe whether the current credentials and kubeconfig still reach the
/// cluster, without mutating anything. The pod listing is the probe the
/// cluster answers cheaply.
pub async fn check_connectivity(namespace: &str) -> Result<bool, CmdError> {
    let output = get_pods_cmd(namespace).run().await?;
    Ok(output.status().success())
}
