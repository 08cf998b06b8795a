use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use labsite_content_engine::auth::{AuthProvider, IdentityToolkitAuth, LocalAuthProvider};
use labsite_content_engine::config::{AuthBackend, Backend, CliArgs};
use labsite_content_engine::firestore::{documents_root, FirestoreClient, FIRESTORE_ENDPOINT};
use labsite_content_engine::panel::AdminPanel;
use labsite_content_engine::remote::{MemoryCollectionClient, RemoteCollectionClient};
use labsite_content_engine::schema::SchemaRegistry;
use labsite_content_engine::server::ContentServer;
use labsite_content_engine::store::PartitionedContentStore;
use labsite_content_engine::transport::NdjsonTransport;
use labsite_content_engine::year::{FixedClock, SystemClock, YearClock};

#[tokio::main]
async fn main() -> Result<()> {
	let args = CliArgs::parse();

	// Logs go to stderr; stdout carries the protocol.
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let auth: Arc<dyn AuthProvider> = match args.auth {
		AuthBackend::Local => {
			let password = args
				.admin_password
				.as_deref()
				.context("local auth needs --admin-password (or LABSITE_ADMIN_PASSWORD)")?;
			Arc::new(LocalAuthProvider::new(&args.admin_email, password))
		}
		AuthBackend::IdentityToolkit => {
			let key = args
				.api_key
				.as_deref()
				.context("identity-toolkit auth needs --api-key")?;
			Arc::new(IdentityToolkitAuth::new(key, args.timeout()))
		}
	};

	let client: Arc<dyn RemoteCollectionClient> = match args.backend {
		Backend::Memory => Arc::new(MemoryCollectionClient::new()),
		Backend::Firestore => {
			let root = match (&args.firestore_root, &args.project_id) {
				(Some(root), _) => root.clone(),
				(None, Some(project)) => documents_root(FIRESTORE_ENDPOINT, project),
				(None, None) => bail!("firestore backend needs --project-id or --firestore-root"),
			};
			let mut firestore =
				FirestoreClient::with_root(root, args.timeout()).with_session(auth.handle());
			if let Some(key) = &args.api_key {
				firestore = firestore.with_api_key(key);
			}
			Arc::new(firestore)
		}
	};
	tracing::info!(backend = ?args.backend, auth = ?args.auth, "Remote configured");

	let clock: Arc<dyn YearClock> = match args.year {
		Some(year) => Arc::new(FixedClock(year)),
		None => Arc::new(SystemClock),
	};

	let mut store = PartitionedContentStore::new(client, SchemaRegistry::lab_site(), clock);
	if !args.preload.is_empty() {
		let report = store.load(&args.preload).await;
		for failure in &report.failures {
			tracing::warn!(category = %failure.category, error = %failure.error, "Preload failed");
		}
	}

	let panel = AdminPanel::new(store, auth, &args.default_category)?;
	let mut server = ContentServer::new(NdjsonTransport::stdout(), panel);

	tracing::info!("labsite-content-engine ready");
	server.run().await?;
	Ok(())
}
