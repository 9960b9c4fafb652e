use metricflow::application::gateway::MetricGateway;
use metricflow::application::system::agent::AgentApplication;
use metricflow::application::system::server::{ServerApplication, ServerHandle};
use metricflow::application::system::{Shutdown, Supervisor};
use metricflow::config::{AgentArgs, AgentConfig, ServerArgs, ServerConfig};
use metricflow::domain::metric::{MetricKind, MetricValue};
use metricflow::infrastructure::host_metrics::GaugeSource;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use std::path::Path;
use tempfile::TempDir;

struct FixedSource;

impl GaugeSource for FixedSource {
    fn read(&mut self) -> Vec<(String, f64)> {
        vec![("Alloc".to_string(), 2048.0), ("RandomValue".to_string(), 0.25)]
    }
}

struct Running {
    gateway: MetricGateway,
    handle: ServerHandle,
    shutdown: Shutdown,
    supervisor: Supervisor,
}

async fn start_server(args: ServerArgs) -> Running {
    let config = ServerConfig::from_args(ServerArgs {
        address: Some("127.0.0.1:0".to_string()),
        grpc_address: Some("127.0.0.1:0".to_string()),
        store_file: Some(String::new()),
        ..args
    })
    .unwrap();

    let app = ServerApplication::build(config).await.unwrap();
    let gateway = app.gateway.clone();
    let shutdown = Shutdown::new();
    let mut supervisor = Supervisor::new(shutdown.clone());
    let handle = app.start(&mut supervisor).await.unwrap();
    Running {
        gateway,
        handle,
        shutdown,
        supervisor,
    }
}

fn agent(args: AgentArgs) -> AgentApplication {
    let config = AgentConfig::from_args(args).unwrap();
    AgentApplication::build_with_source(config, Box::new(FixedSource)).unwrap()
}

fn write_key_pair(dir: &Path) -> (String, String) {
    let private = RsaPrivateKey::new(&mut rsa::rand_core::OsRng, 1024).unwrap();
    let private_path = dir.join("private.pem");
    let public_path = dir.join("public.pem");
    std::fs::write(&private_path, private.to_pkcs8_pem(LineEnding::LF).unwrap().as_bytes()).unwrap();
    std::fs::write(
        &public_path,
        private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap(),
    )
    .unwrap();
    (
        private_path.display().to_string(),
        public_path.display().to_string(),
    )
}

#[tokio::test]
async fn test_http_push_applies_every_form() {
    let server = start_server(ServerArgs::default()).await;
    let agent = agent(AgentArgs {
        address: Some(server.handle.http_addr.to_string()),
        real_ip: Some("10.0.0.7".to_string()),
        ..AgentArgs::default()
    });

    agent.collector.sample();
    let report = agent.transmitter.flush().await;
    assert!(report.failed.is_empty(), "{:?}", report);

    let alloc = server.gateway.find("Alloc", MetricKind::Gauge).await.unwrap();
    assert_eq!(alloc.value, MetricValue::Gauge(2048.0));

    // Positional, JSON and batch forms each carry PollCount = 1.
    let polls = server.gateway.find("PollCount", MetricKind::Counter).await.unwrap();
    assert_eq!(polls.value, MetricValue::Counter(3));

    drop(agent);
    server.shutdown.trigger();
    server.supervisor.wait().await.unwrap();
}

#[tokio::test]
async fn test_signed_encrypted_push_through_trusted_subnet() {
    let dir = TempDir::new().unwrap();
    let (private_path, public_path) = write_key_pair(dir.path());

    let server = start_server(ServerArgs {
        key: Some("secret".to_string()),
        crypto_key: Some(private_path),
        trusted_subnet: Some("10.0.0.0/8".to_string()),
        ..ServerArgs::default()
    })
    .await;

    let trusted = agent(AgentArgs {
        address: Some(server.handle.http_addr.to_string()),
        key: Some("secret".to_string()),
        crypto_key: Some(public_path.clone()),
        real_ip: Some("10.1.1.1".to_string()),
        ..AgentArgs::default()
    });
    trusted.collector.sample();
    let report = trusted.transmitter.flush().await;
    assert!(report.failed.is_empty(), "{:?}", report);
    let alloc = server.gateway.find("Alloc", MetricKind::Gauge).await.unwrap();
    assert!(alloc.is_authentic("secret"));

    let outsider = agent(AgentArgs {
        address: Some(server.handle.http_addr.to_string()),
        key: Some("secret".to_string()),
        crypto_key: Some(public_path),
        real_ip: Some("192.168.0.9".to_string()),
        ..AgentArgs::default()
    });
    outsider.collector.sample();
    assert_eq!(outsider.transmitter.flush().await.failed, vec!["http"]);

    drop((trusted, outsider));
    server.shutdown.trigger();
    server.supervisor.wait().await.unwrap();
}

#[tokio::test]
async fn test_rpc_push() {
    let server = start_server(ServerArgs {
        key: Some("secret".to_string()),
        trusted_subnet: Some("10.0.0.0/8".to_string()),
        ..ServerArgs::default()
    })
    .await;
    let grpc_addr = server.handle.grpc_addr.unwrap();

    // The HTTP side is pointed at a closed port; only RPC can succeed.
    let agent = agent(AgentArgs {
        address: Some("127.0.0.1:1".to_string()),
        grpc_address: Some(grpc_addr.to_string()),
        key: Some("secret".to_string()),
        real_ip: Some("10.0.0.2".to_string()),
        ..AgentArgs::default()
    });
    agent.collector.sample();
    agent.collector.sample();
    let report = agent.transmitter.flush().await;
    assert_eq!(report.failed, vec!["http"]);
    assert_eq!(report.delivered, vec!["rpc"]);

    let polls = server.gateway.find("PollCount", MetricKind::Counter).await.unwrap();
    assert_eq!(polls.value, MetricValue::Counter(2));

    drop(agent);
    server.shutdown.trigger();
    server.supervisor.wait().await.unwrap();
}
