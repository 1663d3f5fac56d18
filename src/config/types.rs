use crate::error::GluetunGostError;
use serde::Deserialize;
use std::path::PathBuf;

/// Default rules template written for the gateway's firewall.
pub const DEFAULT_GATEWAY_RULES: &str = include_str!("../../templates/gateway-post-rules.txt");

/// Default route template applied by the gateway at startup.
pub const DEFAULT_GATEWAY_ROUTES: &str = include_str!("../../templates/gateway-routes.txt");

/// Default route template re-applied by the client whenever the tunnel speaks.
pub const DEFAULT_CLIENT_ROUTES: &str = include_str!("../../templates/client-routes.txt");

/// Top-level configuration from an optional TOML file.
///
/// Every key has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
	#[serde(default)]
	pub gateway: GatewayConfig,

	#[serde(default)]
	pub client: ClientConfig,
}

/// Settings for the gateway role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct GatewayConfig {
	/// Rules template, rendered with `GOST_NET`.
	pub rules: String,

	/// Where the rendered rules are written.
	pub rules_path: PathBuf,

	/// Route template, rendered with `GOST_NET` and `GOST_SERVER`.
	pub routes: String,

	/// Entrypoint handed control once routes are in place.
	pub entrypoint: PathBuf,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			rules: DEFAULT_GATEWAY_RULES.to_string(),
			rules_path: PathBuf::from("/iptables/post-rules.txt"),
			routes: DEFAULT_GATEWAY_ROUTES.to_string(),
			entrypoint: PathBuf::from("/gluetun-entrypoint"),
		}
	}
}

/// Settings for the client role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct ClientConfig {
	/// Route template, rendered with `GOST_CLIENT` and `GOST_SERVER`.
	pub routes: String,

	/// Tunnel interface created by the tunnel client.
	pub interface: String,

	/// Tunnel client program.
	pub tunnel_program: String,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			routes: DEFAULT_CLIENT_ROUTES.to_string(),
			interface: "gost0".to_string(),
			tunnel_program: "gost".to_string(),
		}
	}
}

impl Config {
	/// Reject values that would make the entrypoint unusable.
	pub fn validate(&self) -> Result<(), GluetunGostError> {
		let required = [
			("gateway.rules-path", self.gateway.rules_path.as_os_str().is_empty()),
			("gateway.entrypoint", self.gateway.entrypoint.as_os_str().is_empty()),
			("client.interface", self.client.interface.trim().is_empty()),
			("client.tunnel-program", self.client.tunnel_program.trim().is_empty()),
		];

		if let Some((key, _)) = required.iter().find(|(_, empty)| *empty) {
			return Err(GluetunGostError::InvalidConfig {
				key: key.to_string(),
				reason: "must not be empty".to_string(),
			});
		}

		if self.client.interface.contains(char::is_whitespace) {
			return Err(GluetunGostError::InvalidConfig {
				key: "client.interface".to_string(),
				reason: "must not contain whitespace".to_string(),
			});
		}

		Ok(())
	}
}
