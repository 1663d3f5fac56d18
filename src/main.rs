use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use gluetun_gost::client::{self, run_client};
use gluetun_gost::config::{Config, load_config};
use gluetun_gost::env::{Substitutions, render};
use gluetun_gost::gateway::{self, run_gateway};
use gluetun_gost::routes::{RouteOptions, SystemRunner};

#[derive(Parser)]
#[command(name = "gluetun-gost")]
#[command(
	author,
	version,
	about = "Container entrypoint that templates and applies routes for gost and gluetun"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Enable debug logging
	#[arg(short = 'd', long, global = true)]
	debug: bool,

	/// Execute changes. Without this flag nothing is modified
	#[arg(short = 'x', long, global = true)]
	execute: bool,

	/// TOML file overriding the built-in templates and paths
	#[arg(long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
	/// Write firewall rules, apply gateway routes, then run the gluetun entrypoint
	Gateway,
	/// Run the gost tunnel client and re-apply routes whenever it writes output
	Client,
	/// Print the rendered templates for a role without running anything
	Render {
		#[arg(value_enum)]
		role: Role,
	},
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
	Gateway,
	Client,
}

/// Environment switch enabling debug logging for the gateway role.
const GATEWAY_DEBUG_ENV: &str = "GG_DEBUG";

/// Environment switch enabling debug logging for the client role.
const CLIENT_DEBUG_ENV: &str = "GC_DEBUG";

fn main() -> ExitCode {
	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("{e:#}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<()> {
	let cli = Cli::parse_from(normalize_args(std::env::args_os()));

	let debug_env = match cli.command {
		Commands::Gateway => Some(GATEWAY_DEBUG_ENV),
		Commands::Client => Some(CLIENT_DEBUG_ENV),
		Commands::Render { .. } => None,
	};
	let debug = cli.debug || debug_env.is_some_and(env_flag);
	init_tracing(debug)?;

	let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
	let options = RouteOptions {
		debug,
		execute: cli.execute,
	};

	match cli.command {
		Commands::Gateway => handle_gateway(&config, options),
		Commands::Client => handle_client(config, options),
		Commands::Render { role } => handle_render(&config, role),
	}
}

/// Accept the single-dash `-debug` spelling alongside `--debug`.
fn normalize_args<I>(args: I) -> Vec<std::ffi::OsString>
where
	I: IntoIterator<Item = std::ffi::OsString>,
{
	args.into_iter()
		.map(|arg| {
			if arg == "-debug" {
				"--debug".into()
			} else {
				arg
			}
		})
		.collect()
}

fn env_flag(name: &str) -> bool {
	std::env::var(name).is_ok_and(|value| value == "true")
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr. Debug mode forces the `debug` level, otherwise
/// `RUST_LOG` applies with `info` as the fallback.
fn init_tracing(debug: bool) -> Result<()> {
	use std::io::IsTerminal;
	use tracing_subscriber::{EnvFilter, fmt, prelude::*};

	let filter = if debug {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
	};

	tracing_subscriber::registry()
		.with(
			fmt::layer()
				.with_writer(std::io::stderr)
				.with_ansi(std::io::stderr().is_terminal()),
		)
		.with(filter)
		.try_init()
		.context("Failed to initialize tracing subscriber")?;

	Ok(())
}

fn warn_dry_run(options: RouteOptions) {
	if !options.execute {
		tracing::warn!("dry mode, no changes will be made. Use -x to execute");
	}
}

fn handle_gateway(config: &Config, options: RouteOptions) -> Result<()> {
	let subs = Substitutions::from_env(&gateway::GATEWAY_ENV)
		.context("Missing gateway configuration")?;
	warn_dry_run(options);

	run_gateway(&config.gateway, &subs, options, &SystemRunner).context("Gateway failed")?;

	Ok(())
}

fn handle_client(config: Config, options: RouteOptions) -> Result<()> {
	let subs =
		Substitutions::from_env(&client::CLIENT_ENV).context("Missing client configuration")?;
	warn_dry_run(options);

	run_client(&config.client, subs, options, SystemRunner)
		.with_context(|| format!("failed to run {}", config.client.tunnel_program))?;

	Ok(())
}

fn handle_render(config: &Config, role: Role) -> Result<()> {
	match role {
		Role::Gateway => {
			let rules_subs = Substitutions::from_env(&gateway::RULES_VARS)
				.context("Missing gateway configuration")?;
			let route_subs = Substitutions::from_env(&gateway::ROUTE_VARS)
				.context("Missing gateway configuration")?;

			println!("# rules: {}", config.gateway.rules_path.display());
			print!("{}", ensure_newline(render(&config.gateway.rules, &rules_subs)));
			println!("# routes");
			print!("{}", ensure_newline(render(&config.gateway.routes, &route_subs)));
		}
		Role::Client => {
			let route_subs = Substitutions::from_env(&client::ROUTE_VARS)
				.context("Missing client configuration")?;

			println!("# routes");
			print!("{}", ensure_newline(render(&config.client.routes, &route_subs)));
		}
	}

	Ok(())
}

fn ensure_newline(mut text: String) -> String {
	if !text.is_empty() && !text.ends_with('\n') {
		text.push('\n');
	}
	text
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_single_dash_debug() {
		let args = normalize_args(["gluetun-gost", "-debug", "gateway", "-x"].map(std::ffi::OsString::from));
		assert_eq!(args, vec!["gluetun-gost", "--debug", "gateway", "-x"]);
	}

	#[test]
	fn test_cli_parses_global_flags_after_subcommand() {
		let cli = Cli::parse_from(["gluetun-gost", "client", "-d", "-x"]);
		assert!(cli.debug);
		assert!(cli.execute);
		assert!(matches!(cli.command, Commands::Client));
	}

	#[test]
	fn test_ensure_newline() {
		assert_eq!(ensure_newline("a".to_string()), "a\n");
		assert_eq!(ensure_newline("a\n".to_string()), "a\n");
		assert_eq!(ensure_newline(String::new()), "");
	}
}
