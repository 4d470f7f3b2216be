use registry_gate::observability::init_from_env;
use tracing_subscriber::util::SubscriberInitExt;

// Own test binary: the global subscriber is process-wide.
#[test]
fn init_defers_to_a_host_subscriber() {
    tracing_subscriber::registry()
        .try_init()
        .expect("host subscriber");

    let settings = init_from_env("debug");
    assert!(!settings.installed);

    let again = init_from_env("info");
    assert!(!again.installed);
    tracing::info!("still logging through the host subscriber");
}
