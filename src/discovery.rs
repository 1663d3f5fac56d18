use crate::error::{GluetunGostError, Result};
use crate::routes::CommandRunner;

/// Extract the address following the first `inet ` marker, up to the next `/`.
/// A blank address counts as no address.
pub fn parse_inet_address(output: &str) -> Option<&str> {
	let (_, rest) = output.split_once("inet ")?;
	let (address, _) = rest.split_once('/')?;
	if address.trim().is_empty() {
		return None;
	}
	Some(address)
}

/// Ask `ip` for the configuration of `interface` and return its address.
pub fn discover_address(runner: &dyn CommandRunner, interface: &str) -> Result<String> {
	let args = ["a", "show", "dev", interface];
	let command = format!("ip {}", args.join(" "));

	let out = runner
		.run("ip", &args)
		.map_err(|source| GluetunGostError::DiscoveryFailed {
			command: command.clone(),
			source,
		})?;

	if !out.success() {
		return Err(GluetunGostError::DiscoveryFailed {
			command,
			source: std::io::Error::other(out.output.trim_end().to_string()),
		});
	}

	match parse_inet_address(&out.output) {
		Some(address) => Ok(address.to_string()),
		None => Err(GluetunGostError::NoInetAddress {
			command,
			output: out.output,
		}),
	}
}
