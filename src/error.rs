use std::path::PathBuf;

/// Library-level structured errors for gluetun-gost.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum GluetunGostError {
	/// A variable named in the substitution context is unset or empty.
	/// This is a configuration error and always ends the process.
	#[error("{name} not set in env")]
	MissingVariable { name: String },

	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid config value for {key}: {reason}")]
	InvalidConfig { key: String, reason: String },

	#[error("failed to execute {command} err='{source}'")]
	RouteLaunchFailed {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to execute {command} err='{}' output='{output}'", describe_exit(.exit_code))]
	RouteExitFailed {
		command: String,
		exit_code: Option<i32>,
		output: String,
	},

	#[error("Address query failed: {command}")]
	DiscoveryFailed {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{command} has no inet address: {output}")]
	NoInetAddress { command: String, output: String },

	#[error("Failed to write rules file: {path}")]
	RulesWriteFailed {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to launch {program}")]
	ProgramLaunchFailed {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{program} exited unsuccessfully ({})", describe_exit(.exit_code))]
	ProgramExitFailed {
		program: String,
		exit_code: Option<i32>,
	},
}

fn describe_exit(exit_code: &Option<i32>) -> String {
	match exit_code {
		Some(code) => format!("exit status {code}"),
		None => "terminated by signal".to_string(),
	}
}

/// Result type alias using GluetunGostError.
pub type Result<T> = std::result::Result<T, GluetunGostError>;
