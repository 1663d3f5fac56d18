use crate::env::{Substitutions, render};
use crate::error::{GluetunGostError, Result};
use std::io::Read;
use std::process::{Command, Stdio};

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
	/// Exit code, `None` when killed by a signal.
	pub exit_code: Option<i32>,

	/// Standard output and standard error, interleaved as the child wrote them.
	pub output: String,
}

impl CommandOutput {
	pub fn success(&self) -> bool {
		self.exit_code == Some(0)
	}
}

/// Runs a command to completion and captures its output.
pub trait CommandRunner: Send + Sync {
	fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
	fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
		let (mut reader, writer) = std::io::pipe()?;

		// The command keeps copies of the write end until it is dropped.
		let mut child = {
			let mut command = Command::new(program);
			command
				.args(args)
				.stdin(Stdio::null())
				.stdout(writer.try_clone()?)
				.stderr(writer);
			command.spawn()?
		};

		let mut combined = Vec::new();
		let read = reader.read_to_end(&mut combined);
		let status = child.wait()?;
		read?;

		Ok(CommandOutput {
			exit_code: status.code(),
			output: String::from_utf8_lossy(&combined).into_owned(),
		})
	}
}

/// Flags controlling a route pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteOptions {
	/// Log each command and its outcome.
	pub debug: bool,

	/// Actually run the commands. When false the pass only logs.
	pub execute: bool,
}

/// One parsed line of a route specification. Always has at least one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCommand<'a> {
	line: &'a str,

	tokens: Vec<&'a str>,
}

impl<'a> RouteCommand<'a> {
	/// Parse a line, returning `None` for lines without any tokens.
	pub fn parse(line: &'a str) -> Option<Self> {
		let tokens: Vec<&str> = line.split_whitespace().collect();
		if tokens.is_empty() {
			return None;
		}
		Some(Self { line, tokens })
	}

	/// The line as written, used in logs and errors.
	pub fn line(&self) -> &'a str {
		self.line
	}

	pub fn program(&self) -> &'a str {
		self.tokens[0]
	}

	pub fn args(&self) -> &[&'a str] {
		&self.tokens[1..]
	}

	/// Deletions may fail without aborting the pass.
	pub fn is_delete(&self) -> bool {
		self.tokens.contains(&"del")
	}
}

/// Split a rendered route specification into commands, skipping blank lines.
pub fn parse_routes(routes: &str) -> Vec<RouteCommand<'_>> {
	routes.lines().filter_map(RouteCommand::parse).collect()
}

/// Render `template` with `subs` and apply every resulting command.
///
/// Lines run strictly in order. A failing line aborts the pass unless it is a
/// deletion, whose failures are expected when the route is already gone.
/// Already applied lines are never rolled back when a later line fails.
pub fn apply_routes(
	template: &str,
	subs: &Substitutions,
	options: RouteOptions,
	runner: &dyn CommandRunner,
) -> Result<()> {
	let routes = render(template, subs);

	for route in parse_routes(&routes) {
		if options.debug {
			tracing::debug!(cmd = route.line(), "adjusting routes");
		}

		if !options.execute {
			continue;
		}

		let is_delete = route.is_delete();
		match runner.run(route.program(), route.args()) {
			Ok(out) if out.success() => {
				if options.debug {
					tracing::debug!(
						output = %out.output,
						cmd = route.line(),
						exit_code = ?out.exit_code,
						"adjusting routes"
					);
				}
			}
			Ok(out) => {
				if !is_delete {
					return Err(GluetunGostError::RouteExitFailed {
						command: route.line().to_string(),
						exit_code: out.exit_code,
						output: out.output,
					});
				}
				if options.debug {
					tracing::debug!(
						output = %out.output,
						cmd = route.line(),
						exit_code = ?out.exit_code,
						"ignoring failed deletion"
					);
				}
			}
			Err(source) => {
				if !is_delete {
					return Err(GluetunGostError::RouteLaunchFailed {
						command: route.line().to_string(),
						source,
					});
				}
				if options.debug {
					tracing::debug!(cmd = route.line(), err = %source, "ignoring failed deletion");
				}
			}
		}
	}

	Ok(())
}


#[cfg(test)]
mod tests {
	use super::testing::FakeRunner;
	use super::*;

	fn subs() -> Substitutions {
		Substitutions::resolve(&["NET", "SRV"], |name| match name {
			"NET" => Some("10.8.0.0/24".to_string()),
			"SRV" => Some("1.2.3.4".to_string()),
			_ => None,
		})
		.unwrap()
	}

	const EXECUTE: RouteOptions = RouteOptions {
		debug: true,
		execute: true,
	};

	#[test]
	fn test_parse_routes_skips_blank_lines() {
		let routes = parse_routes("ip route add a\n\n   \nip route del b\n");
		assert_eq!(routes.len(), 2);
		assert_eq!(routes[0].program(), "ip");
		assert_eq!(routes[0].args(), &["route", "add", "a"]);
		assert!(!routes[0].is_delete());
		assert!(routes[1].is_delete());
	}

	#[test]
	fn test_delete_requires_exact_token() {
		let route = RouteCommand::parse("ip route delete 10.0.0.0/8").unwrap();
		assert!(!route.is_delete());
		let route = RouteCommand::parse("iptables -t nat del x").unwrap();
		assert!(route.is_delete());
	}

	#[test]
	fn test_dry_run_launches_nothing() {
		let runner = FakeRunner::default();
		let options = RouteOptions {
			debug: true,
			execute: false,
		};

		apply_routes(
			"ip route add ${NET} via ${SRV}\nip route del ${NET}\nfalse",
			&subs(),
			options,
			&runner,
		)
		.unwrap();

		assert!(runner.calls().is_empty());
	}

	#[test]
	fn test_example_scenario_delete_failure_ignored() {
		let runner = FakeRunner::default().respond("ip route del 10.8.0.0/24", 2, "No such process");

		apply_routes(
			"ip route add ${NET} via ${SRV}\nip route del ${NET}",
			&subs(),
			EXECUTE,
			&runner,
		)
		.unwrap();

		assert_eq!(
			runner.calls(),
			vec![
				"ip route add 10.8.0.0/24 via 1.2.3.4",
				"ip route del 10.8.0.0/24"
			]
		);
	}

	#[test]
	fn test_non_delete_failure_stops_the_pass() {
		let runner = FakeRunner::default().respond(
			"ip route add 10.8.0.0/24 via 1.2.3.4",
			2,
			"RTNETLINK answers: File exists",
		);

		let err = apply_routes(
			"ip route del ${NET}\nip route add ${NET} via ${SRV}\nip route add default via ${SRV}",
			&subs(),
			EXECUTE,
			&runner,
		)
		.unwrap_err();

		assert_eq!(runner.calls().len(), 2);
		match err {
			GluetunGostError::RouteExitFailed {
				command,
				exit_code,
				output,
			} => {
				assert_eq!(command, "ip route add 10.8.0.0/24 via 1.2.3.4");
				assert_eq!(exit_code, Some(2));
				assert_eq!(output, "RTNETLINK answers: File exists");
			}
			other => panic!("Expected RouteExitFailed, got {:?}", other),
		}
	}

	#[test]
	fn test_launch_failure_of_delete_is_ignored() {
		let runner = FakeRunner::default().fail_launch("ip route del 10.8.0.0/24");

		apply_routes(
			"ip route del ${NET}\nip route add ${NET} via ${SRV}",
			&subs(),
			EXECUTE,
			&runner,
		)
		.unwrap();

		assert_eq!(runner.calls().len(), 2);
	}

	#[test]
	fn test_launch_failure_of_add_is_reported() {
		let runner = FakeRunner::default().fail_launch("ip route add 10.8.0.0/24 via 1.2.3.4");

		let err = apply_routes(
			"ip route add ${NET} via ${SRV}\nip route del ${NET}",
			&subs(),
			EXECUTE,
			&runner,
		)
		.unwrap_err();

		assert_eq!(runner.calls().len(), 1);
		assert!(matches!(err, GluetunGostError::RouteLaunchFailed { .. }));
		assert!(err.to_string().contains("ip route add 10.8.0.0/24 via 1.2.3.4"));
	}

	#[cfg(unix)]
	#[test]
	fn test_system_runner_captures_output_and_status() {
		let out = SystemRunner.run("sh", &["-c", "echo out; echo err >&2; exit 3"]).unwrap();
		assert_eq!(out.exit_code, Some(3));
		assert!(!out.success());
		assert!(out.output.contains("out"));
		assert!(out.output.contains("err"));
	}

	#[cfg(unix)]
	#[test]
	fn test_system_runner_interleaves_streams_in_write_order() {
		let out = SystemRunner
			.run("sh", &["-c", "echo err1 >&2; echo out2; echo err3 >&2"])
			.unwrap();
		assert_eq!(out.output, "err1\nout2\nerr3\n");
		assert!(out.success());
	}

	#[test]
	fn test_parse_rejects_lines_without_tokens() {
		assert!(RouteCommand::parse("").is_none());
		assert!(RouteCommand::parse(" \t ").is_none());
		let route = RouteCommand::parse("  ip route add a ").unwrap();
		assert_eq!(route.line(), "  ip route add a ");
		assert_eq!(route.program(), "ip");
	}

	#[test]
	fn test_system_runner_missing_program() {
		let result = SystemRunner.run("/nonexistent/path/to/binary", &[]);
		assert!(result.is_err());
	}
}
