use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
	/// In-process collections, lost on exit
	Memory,
	/// Firestore REST API
	Firestore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthBackend {
	/// Single admin account from --admin-email / --admin-password
	Local,
	/// Google Identity Toolkit email/password sign-in (needs --api-key)
	IdentityToolkit,
}

#[derive(Parser, Debug)]
#[command(
	name = "labsite-content-engine",
	about = "Year-partitioned lab website content over JSON-RPC 2.0 / NDJSON stdio"
)]
pub struct CliArgs {
	/// Where records are stored
	#[arg(long, value_enum, default_value = "memory", env = "LABSITE_BACKEND")]
	pub backend: Backend,

	/// How admins sign in
	#[arg(long, value_enum, default_value = "local", env = "LABSITE_AUTH")]
	pub auth: AuthBackend,

	/// Firestore project id (firestore backend)
	#[arg(long, env = "LABSITE_FIRESTORE_PROJECT")]
	pub project_id: Option<String>,

	/// Full documents root, overriding the project URL (e.g. an emulator)
	#[arg(long, env = "LABSITE_FIRESTORE_ROOT")]
	pub firestore_root: Option<String>,

	/// Web API key for Firestore and Identity Toolkit
	#[arg(long, env = "LABSITE_API_KEY")]
	pub api_key: Option<String>,

	/// Per-request timeout for remote calls, in seconds
	#[arg(long, default_value = "10", env = "LABSITE_TIMEOUT")]
	pub timeout_secs: u64,

	/// Admin email for local auth
	#[arg(long, default_value = "admin@localhost", env = "LABSITE_ADMIN_EMAIL")]
	pub admin_email: String,

	/// Admin password for local auth
	#[arg(long, env = "LABSITE_ADMIN_PASSWORD", hide_env_values = true)]
	pub admin_password: Option<String>,

	/// Pin the "current year" used for records created without one
	#[arg(long, env = "LABSITE_YEAR")]
	pub year: Option<i32>,

	/// Category whose tab is open on start
	#[arg(long, default_value = "lectures", env = "LABSITE_DEFAULT_CATEGORY")]
	pub default_category: String,

	/// Categories to load before serving requests (comma separated)
	#[arg(long, value_delimiter = ',', env = "LABSITE_PRELOAD")]
	pub preload: Vec<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "info", env = "LABSITE_LOG_LEVEL")]
	pub log_level: String,
}

impl CliArgs {
	pub fn timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.timeout_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_to_memory_and_local_auth() {
		let args = CliArgs::try_parse_from(["labsite-content-engine"]).unwrap();
		assert_eq!(args.backend, Backend::Memory);
		assert_eq!(args.auth, AuthBackend::Local);
		assert_eq!(args.default_category, "lectures");
		assert!(args.preload.is_empty());
	}

	#[test]
	fn parses_firestore_options() {
		let args = CliArgs::try_parse_from([
			"labsite-content-engine",
			"--backend",
			"firestore",
			"--auth",
			"identity-toolkit",
			"--project-id",
			"lab-site",
			"--preload",
			"events,members",
			"--year",
			"2026",
		])
		.unwrap();
		assert_eq!(args.backend, Backend::Firestore);
		assert_eq!(args.auth, AuthBackend::IdentityToolkit);
		assert_eq!(args.project_id.as_deref(), Some("lab-site"));
		assert_eq!(args.preload, vec!["events", "members"]);
		assert_eq!(args.year, Some(2026));
	}
}
