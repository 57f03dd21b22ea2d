//! rigger-sudoutil: privileged helper for the provisioning bridge.
//!
//! Invoked by the unprivileged bridge process as
//! `sudo -n rigger-sudoutil <mode> [args...]`. The sudoers entry grants
//! exactly this binary, so the mode set below is the complete privileged
//! surface. Every argument is strictly validated before it reaches a
//! system command, and each mode maps to fixed absolute command paths
//! rather than anything caller-controlled.
//!
//! Modes:
//!   ping                              liveness check, prints "pong"
//!   docker-enable <user>              rootless docker prerequisites
//!   docker-disable <user>             tear rootless docker down
//!   linger-enable <user>              loginctl enable-linger
//!   linger-disable <user>             loginctl disable-linger
//!   user-service-start <user> <unit>  start an allowlisted user unit
//!
//! Exit status: 0 on success, 1 on a failed system command, 2 on a
//! usage or validation error. Command output passes through on the
//! standard streams so the bridge can capture it.

use std::process::{Command, ExitCode};

use rigger_sudoutil::validate::{validate_unit, validate_username};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((mode, rest)) = args.split_first() else {
        eprintln!("rigger-sudoutil: missing mode");
        return ExitCode::from(2);
    };

    let result = match (mode.as_str(), rest) {
        ("ping", []) => {
            println!("pong");
            Ok(())
        }
        ("docker-enable", [user]) => docker_enable(user.as_str()),
        ("docker-disable", [user]) => docker_disable(user.as_str()),
        ("linger-enable", [user]) => linger(user.as_str(), true),
        ("linger-disable", [user]) => linger(user.as_str(), false),
        ("user-service-start", [user, unit]) => user_service_start(user.as_str(), unit.as_str()),
        (other, _) => {
            eprintln!("rigger-sudoutil: unknown mode or bad arity: {other}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(HelperError::Validation(msg)) => {
            eprintln!("rigger-sudoutil: {msg}");
            ExitCode::from(2)
        }
        Err(HelperError::Command(msg)) => {
            eprintln!("rigger-sudoutil: {msg}");
            ExitCode::from(1)
        }
    }
}

enum HelperError {
    Validation(String),
    Command(String),
}

impl From<String> for HelperError {
    fn from(msg: String) -> Self {
        HelperError::Validation(msg)
    }
}

/// Rootless docker needs subuid/subgid ranges and lingering so the
/// user's systemd instance survives logout.
fn docker_enable(user: &str) -> Result<(), HelperError> {
    validate_username(user)?;
    run_cmd(
        "/usr/sbin/usermod",
        &["--add-subuids", "100000-165535", "--add-subgids", "100000-165535", user],
    )?;
    run_cmd("/usr/bin/loginctl", &["enable-linger", user])?;
    Ok(())
}

fn docker_disable(user: &str) -> Result<(), HelperError> {
    validate_username(user)?;
    run_cmd("/usr/bin/loginctl", &["disable-linger", user])?;
    Ok(())
}

fn linger(user: &str, enable: bool) -> Result<(), HelperError> {
    validate_username(user)?;
    let verb = if enable { "enable-linger" } else { "disable-linger" };
    run_cmd("/usr/bin/loginctl", &[verb, user])?;
    Ok(())
}

fn user_service_start(user: &str, unit: &str) -> Result<(), HelperError> {
    validate_username(user)?;
    validate_unit(unit)?;
    let machine = format!("{user}@");
    run_cmd(
        "/usr/bin/systemctl",
        &["--machine", machine.as_str(), "--user", "start", unit],
    )?;
    Ok(())
}

fn run_cmd(cmd: &str, args: &[&str]) -> Result<(), HelperError> {
    let status = Command::new(cmd)
        .args(args)
        .status()
        .map_err(|e| HelperError::Command(format!("failed to execute {cmd}: {e}")))?;

    if !status.success() {
        return Err(HelperError::Command(format!(
            "{cmd} failed (exit {})",
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}
