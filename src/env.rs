use crate::error::{GluetunGostError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Matches anything that still looks like a variable reference after rendering.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
		.expect("placeholder pattern is valid")
});

/// A resolved substitution context: an ordered list of variable names with
/// their values, captured once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
	vars: Vec<(String, String)>,
}

impl Substitutions {
	/// Resolve `names` from the process environment.
	pub fn from_env(names: &[&str]) -> Result<Self> {
		Self::resolve(names, |name| std::env::var(name).ok())
	}

	/// Resolve `names` through `lookup`. Fails on the first name whose value is
	/// missing or empty, before anything is rendered.
	pub fn resolve<F>(names: &[&str], lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut vars = Vec::with_capacity(names.len());
		for &name in names {
			match lookup(name) {
				Some(value) if !value.is_empty() => vars.push((name.to_string(), value)),
				_ => {
					return Err(GluetunGostError::MissingVariable {
						name: name.to_string(),
					});
				}
			}
		}
		Ok(Self { vars })
	}

	/// Value currently bound to `name`, if it is part of this context.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.vars
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v.as_str())
	}

	/// Rebind `name`, keeping its position in the substitution order. Unknown
	/// names are appended.
	pub fn set(&mut self, name: &str, value: impl Into<String>) {
		let value = value.into();
		match self.vars.iter_mut().find(|(n, _)| n == name) {
			Some((_, v)) => *v = value,
			None => self.vars.push((name.to_string(), value)),
		}
	}

	/// A copy restricted to `names`, in the order given.
	pub fn select(&self, names: &[&str]) -> Result<Self> {
		Self::resolve(names, |name| self.get(name).map(str::to_string))
	}

	/// Variable names in substitution order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.vars.iter().map(|(n, _)| n.as_str())
	}

	/// Render `template`.
	///
	/// Variables are processed in order. For each one, every `${NAME}` and then
	/// every `$NAME` is replaced before moving to the next variable, so text
	/// inserted for a later variable is never rescanned for earlier ones.
	///
	/// There is no escaping: any `$NAME` substring is replaced, even one that
	/// was not meant as a reference.
	pub fn apply(&self, template: &str) -> String {
		let mut data = template.to_string();
		for (name, value) in &self.vars {
			data = data.replace(&format!("${{{name}}}"), value);
			data = data.replace(&format!("${name}"), value);
		}
		data
	}
}

/// Variable references left in `rendered`, deduplicated in order of first
/// appearance.
pub fn find_unresolved(rendered: &str) -> Vec<String> {
	let mut found: Vec<String> = Vec::new();
	for caps in PLACEHOLDER.captures_iter(rendered) {
		let name = caps
			.get(1)
			.or_else(|| caps.get(2))
			.map(|m| m.as_str().to_string());
		if let Some(name) = name
			&& !found.contains(&name)
		{
			found.push(name);
		}
	}
	found
}

/// Render `template` and warn about references that were left untouched.
pub fn render(template: &str, subs: &Substitutions) -> String {
	let rendered = subs.apply(template);
	for name in find_unresolved(&rendered) {
		tracing::warn!(var = %name, "unresolved variable reference in template");
	}
	rendered
}
