use crate::config::GatewayConfig;
use crate::env::{Substitutions, render};
use crate::error::{GluetunGostError, Result};
use crate::routes::{CommandRunner, RouteOptions, apply_routes};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

pub const NET_VAR: &str = "GOST_NET";
pub const SERVER_VAR: &str = "GOST_SERVER";

/// Variables the gateway needs from the environment.
pub const GATEWAY_ENV: [&str; 2] = [NET_VAR, SERVER_VAR];

/// Variables substituted into the rules template.
pub const RULES_VARS: [&str; 1] = [NET_VAR];

/// Variables substituted into the route template, in order.
pub const ROUTE_VARS: [&str; 2] = [NET_VAR, SERVER_VAR];

/// Render the rules template and, when executing, write it to `rules_path`.
///
/// The parent directory is created if needed and the file is overwritten.
/// Returns the rendered rules.
pub fn save_rules(
	config: &GatewayConfig,
	subs: &Substitutions,
	options: RouteOptions,
) -> Result<String> {
	let rules = render(&config.rules, &subs.select(&RULES_VARS)?);
	let path = config.rules_path.as_path();

	if options.debug {
		tracing::debug!(path = %path.display(), rules = %rules, "writing rules");
	}

	if !options.execute {
		return Ok(rules);
	}

	write_rules(path, &rules).map_err(|source| GluetunGostError::RulesWriteFailed {
		path: path.to_path_buf(),
		source,
	})?;

	Ok(rules)
}

fn write_rules(path: &Path, rules: &str) -> std::io::Result<()> {
	if let Some(parent) = path.parent()
		&& !parent.as_os_str().is_empty()
	{
		create_dir(parent)?;
	}
	fs::write(path, rules)?;
	set_mode(path, 0o644)
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> std::io::Result<()> {
	use std::os::unix::fs::DirBuilderExt;
	fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> std::io::Result<()> {
	fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
	Ok(())
}

/// Run the wrapped entrypoint with inherited stdio until it exits.
pub fn run_entrypoint(entrypoint: &Path) -> Result<()> {
	let program = entrypoint.display().to_string();

	let status = Command::new(entrypoint)
		.stdin(Stdio::inherit())
		.stdout(Stdio::inherit())
		.stderr(Stdio::inherit())
		.status()
		.map_err(|source| GluetunGostError::ProgramLaunchFailed {
			program: program.clone(),
			source,
		})?;

	if !status.success() {
		return Err(GluetunGostError::ProgramExitFailed {
			program,
			exit_code: status.code(),
		});
	}

	Ok(())
}

/// Full gateway sequence: rules, routes, then the wrapped entrypoint.
///
/// In dry-run nothing is written or executed and the entrypoint is not
/// started.
pub fn run_gateway(
	config: &GatewayConfig,
	subs: &Substitutions,
	options: RouteOptions,
	runner: &dyn CommandRunner,
) -> Result<()> {
	save_rules(config, subs, options)?;

	apply_routes(&config.routes, &subs.select(&ROUTE_VARS)?, options, runner)?;

	if options.debug {
		tracing::debug!(entrypoint = %config.entrypoint.display(), "starting wrapped entrypoint");
	}

	if !options.execute {
		return Ok(());
	}

	run_entrypoint(&config.entrypoint)
}
