use crate::config::ClientConfig;
use crate::discovery::discover_address;
use crate::env::Substitutions;
use crate::error::{GluetunGostError, Result};
use crate::routes::{CommandRunner, RouteOptions, apply_routes};
use crate::trigger::WriteTrigger;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

pub const SERVER_VAR: &str = "GOST_SERVER";
pub const CLIENT_VAR: &str = "GOST_CLIENT";
pub const PORT_VAR: &str = "GOST_PORT";

/// Variables the client needs from the environment at startup.
pub const CLIENT_ENV: [&str; 3] = [SERVER_VAR, CLIENT_VAR, PORT_VAR];

/// Variables substituted into the client route template, in order.
pub const ROUTE_VARS: [&str; 2] = [CLIENT_VAR, SERVER_VAR];

/// Listen URI handed to the tunnel client.
pub fn tunnel_uri(subs: &Substitutions, interface: &str) -> Result<String> {
	let server = required(subs, SERVER_VAR)?;
	let port = required(subs, PORT_VAR)?;
	let net = required(subs, CLIENT_VAR)?;
	Ok(format!("tun://:0/{server}:{port}?net={net}&name={interface}"))
}

fn required<'a>(subs: &'a Substitutions, name: &str) -> Result<&'a str> {
	subs.get(name).ok_or_else(|| GluetunGostError::MissingVariable {
		name: name.to_string(),
	})
}

/// Rediscovers the tunnel address and re-applies routes, one run at a time.
///
/// Any output from the tunnel client is taken as a sign that the tunnel may
/// have (re)appeared. Runs are serialized by one mutex and never coalesced.
pub struct RouteReapplier<R> {
	state: Mutex<Substitutions>,
	routes: String,
	interface: String,
	options: RouteOptions,
	runner: R,
}

impl<R: CommandRunner> RouteReapplier<R> {
	pub fn new(
		subs: Substitutions,
		routes: impl Into<String>,
		interface: impl Into<String>,
		options: RouteOptions,
		runner: R,
	) -> Self {
		Self {
			state: Mutex::new(subs),
			routes: routes.into(),
			interface: interface.into(),
			options,
			runner,
		}
	}

	/// Substitution context as of the last discovery.
	pub fn current(&self) -> Substitutions {
		self.state
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// Discover the tunnel address, record it, and apply the route template.
	///
	/// The lock is held for the whole run. A failed discovery leaves the
	/// recorded address untouched. Returns the discovered address.
	pub fn reapply(&self) -> Result<String> {
		let mut subs = self.state.lock().unwrap_or_else(PoisonError::into_inner);

		let ip = discover_address(&self.runner, &self.interface)?;
		if self.options.debug {
			tracing::debug!(ip = %ip, interface = %self.interface, "own tunnel ip");
		}

		subs.set(CLIENT_VAR, ip.as_str());
		let route_subs = subs.select(&ROUTE_VARS)?;
		apply_routes(&self.routes, &route_subs, self.options, &self.runner)?;

		Ok(ip)
	}

	/// Callback for the write trigger. Failures are logged, never returned.
	pub fn trigger(&self) {
		match self.reapply() {
			Ok(ip) => tracing::info!(ip = %ip, "adjusted routes"),
			Err(
				err @ (GluetunGostError::DiscoveryFailed { .. }
				| GluetunGostError::NoInetAddress { .. }),
			) => {
				tracing::error!(err = %err, interface = %self.interface, "failed to get own tunnel ip");
			}
			Err(err) => tracing::error!(err = %err, "failed to adjust routes"),
		}
	}
}

/// Copy `source` into `sink`, firing the reapplier before every write.
pub fn forward<S, W, R>(mut source: S, sink: W, reapplier: &RouteReapplier<R>) -> io::Result<u64>
where
	S: Read,
	W: Write,
	R: CommandRunner,
{
	let mut sink = WriteTrigger::new(sink, || reapplier.trigger());
	let copied = io::copy(&mut source, &mut sink)?;
	sink.flush()?;
	Ok(copied)
}

/// Run the tunnel client until it exits, re-applying routes on its output.
pub fn run_client<R: CommandRunner>(
	config: &ClientConfig,
	subs: Substitutions,
	options: RouteOptions,
	runner: R,
) -> Result<()> {
	let uri = tunnel_uri(&subs, &config.interface)?;
	let program = config.tunnel_program.as_str();
	tracing::debug!(program, uri = %uri, "starting tunnel client");

	let mut child = Command::new(program)
		.arg(format!("-L={uri}"))
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|source| GluetunGostError::ProgramLaunchFailed {
			program: program.to_string(),
			source,
		})?;

	let reapplier = RouteReapplier::new(
		subs,
		config.routes.as_str(),
		config.interface.as_str(),
		options,
		runner,
	);
	let stdout = child.stdout.take();
	let stderr = child.stderr.take();

	std::thread::scope(|scope| {
		let reapplier = &reapplier;
		if let Some(out) = stdout {
			scope.spawn(move || {
				if let Err(err) = forward(out, io::stdout(), reapplier) {
					tracing::warn!(err = %err, "stdout forwarding stopped");
				}
			});
		}
		if let Some(err_stream) = stderr {
			scope.spawn(move || {
				if let Err(err) = forward(err_stream, io::stderr(), reapplier) {
					tracing::warn!(err = %err, "stderr forwarding stopped");
				}
			});
		}
	});

	let status = child
		.wait()
		.map_err(|source| GluetunGostError::ProgramLaunchFailed {
			program: program.to_string(),
			source,
		})?;

	if !status.success() {
		return Err(GluetunGostError::ProgramExitFailed {
			program: program.to_string(),
			exit_code: status.code(),
		});
	}

	Ok(())
}
