use torrust_udp_tracker::bootstrap::{app, jobs};
use torrust_udp_tracker::core::middleware::Registry;
use torrust_udp_tracker::core::peer_store::MemoryPeerStore;
use torrust_udp_tracker_configuration::Configuration;
use tracing::info;

const CONFIG_ENV_VAR_NAME: &str = "TORRUST_UDP_TRACKER_CONFIG";

#[tokio::main]
async fn main() {
    let configuration = if std::env::var(CONFIG_ENV_VAR_NAME).is_ok() {
        Configuration::load_from_env_var(CONFIG_ENV_VAR_NAME)
            .expect("the configuration should be a valid TOML document in the TORRUST_UDP_TRACKER_CONFIG env var")
    } else {
        println!("No configuration provided ({CONFIG_ENV_VAR_NAME} is unset); using defaults with an ephemeral instance key");
        Configuration::default()
    };

    // The default build runs with in-process swarm storage and no extra
    // middleware. Deployments with their own middleware or storage backend
    // use the library crate and register them here.
    let (configuration, tracker, _stats_repository) = app::setup(
        configuration,
        &Registry::default(),
        std::sync::Arc::new(MemoryPeerStore::new()),
    )
    .expect("the configured middleware chains should compose");

    let job = jobs::udp_tracker::start_job(&configuration.udp_tracker, tracker).await;

    // The UDP service shuts itself down on SIGINT/SIGTERM; wait for it.
    job.await.expect("the UDP tracker service should shut down cleanly");

    info!("goodbye.");
}
