//! The `aws` CLI invocations behind a session bootstrap.
//!
//! All three operations shell out to the `aws` binary with fixed argument
//! orders; the operator's credential cache and kubeconfig are mutated by the
//! vendor tool, never by us.

use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::app::cmd::{Cmd, CmdError};

/// Connection coordinates for the IAM-authenticated database endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DbTokenInput {
    pub profile: String,
    pub hostname: String,
    pub port: u16,
    pub region: String,
    pub username: String,
}

pub fn sso_login_cmd(profile: &str) -> Cmd {
    Cmd::new("aws", ["sso", "login", "--profile", profile])
}

pub fn update_kubeconfig_cmd(profile: &str, cluster: &str) -> Cmd {
    Cmd::new(
        "aws",
        [
            "eks",
            "--profile",
            profile,
            "update-kubeconfig",
            "--name",
            cluster,
        ],
    )
}

pub fn db_auth_token_cmd(input: &DbTokenInput) -> Cmd {
    let port = input.port.to_string();
    Cmd::new(
        "aws",
        [
            "rds",
            "generate-db-auth-token",
            "--profile",
            input.profile.as_str(),
            "--hostname",
            input.hostname.as_str(),
            "--port",
            port.as_str(),
            "--region",
            input.region.as_str(),
            "--username",
            input.username.as_str(),
        ],
    )
    .quiet()
}

/// Authenticate the local session against the identity provider.
pub async fn sso_login(profile: &str) -> Result<(), CmdError> {
    login_with(sso_login_cmd(profile)).await
}

/// Run a login command to completion, surfacing the SSO device code the
/// moment the banner prints it. The stream itself passes through untouched.
pub(crate) async fn login_with(cmd: Cmd) -> Result<(), CmdError> {
    cmd.run_with(|line| {
        if let Some(code) = extract_login_code(line) {
            info!("SSO device code: {code}");
        }
        if line.contains("Successfully") {
            info!("SSO login complete");
        }
    })
    .await?
    .ensure_success()?;
    Ok(())
}

/// Fetch and merge connection config for the cluster into the local
/// kubeconfig.
pub async fn update_kubeconfig(profile: &str, cluster: &str) -> Result<(), CmdError> {
    update_kubeconfig_cmd(profile, cluster)
        .run()
        .await?
        .ensure_success()?;
    Ok(())
}

/// Request a short-lived IAM auth token for the database endpoint. The
/// token is the child's stdout and is returned, not echoed.
pub async fn generate_db_auth_token(input: &DbTokenInput) -> Result<String, CmdError> {
    let output = db_auth_token_cmd(input).run().await?.ensure_success()?;
    Ok(output.stdout().to_string())
}

fn login_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]{4}-[A-Za-z]{4}").expect("valid literal regex"))
}

/// The device code the SSO banner asks the operator to confirm in the
/// browser, e.g. `MQBJ-XSZB`.
fn extract_login_code(line: &str) -> Option<&str> {
    login_code_regex().find(line).map(|code| code.as_str())
}

#[cfg(test)]
mod test {
    use super::*;

    const SSO_BANNER: &str = "\
Attempting to automatically open the SSO authorization page in your default browser.
If the browser does not open or you wish to use a different device to authorize this request, open the following URL:

https://device.sso.eu-west-1.amazonaws.com/

Then enter the code:

MQBJ-XSZB";

    #[test]
    fn sso_login_line_is_verbatim() {
        let cmd = sso_login_cmd("dev-profile");
        assert_eq!(cmd.line(), "aws sso login --profile dev-profile");
    }

    #[test]
    fn update_kubeconfig_line_is_verbatim() {
        let cmd = update_kubeconfig_cmd("dev-profile", "shared-2");
        assert_eq!(
            cmd.line(),
            "aws eks --profile dev-profile update-kubeconfig --name shared-2"
        );
    }

    #[test]
    fn db_auth_token_line_is_verbatim() {
        let input = DbTokenInput {
            profile: "dev-profile".to_string(),
            hostname: "db.example.com".to_string(),
            port: 3306,
            region: "eu-west-2".to_string(),
            username: "app_user".to_string(),
        };
        let cmd = db_auth_token_cmd(&input);
        assert_eq!(
            cmd.line(),
            "aws rds generate-db-auth-token --profile dev-profile --hostname db.example.com --port 3306 --region eu-west-2 --username app_user"
        );
        // Identical inputs give byte-identical command lines.
        assert_eq!(cmd.line(), db_auth_token_cmd(&input).line());
    }

    #[test]
    fn extracts_the_device_code_from_the_banner() {
        let codes: Vec<_> = SSO_BANNER.lines().filter_map(extract_login_code).collect();
        assert_eq!(codes, ["MQBJ-XSZB"]);
    }

    #[test]
    fn ordinary_lines_carry_no_device_code() {
        assert_eq!(extract_login_code("Attempting to open the page"), None);
        assert_eq!(extract_login_code(""), None);
    }

    #[test_log::test(tokio::test)]
    async fn login_succeeds_on_clean_exit() {
        let fake = Cmd::new(
            "sh",
            [
                "-c",
                "printf 'Then enter the code:\\nMQBJ-XSZB\\nSuccessfully logged in\\n'",
            ],
        )
        .quiet();
        login_with(fake).await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn login_failure_is_fatal() {
        let fake = Cmd::new("sh", ["-c", "echo 'Error loading SSO Token' >&2; exit 1"]);
        let err = login_with(fake).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
