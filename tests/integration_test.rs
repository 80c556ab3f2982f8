//! Integration tests for the SQS adapter
//!
//! These tests use testcontainers to start an ElasticMQ container, which
//! speaks the SQS API. Docker must be installed and running, so the tests
//! are marked #[ignore].
//!
//! To run these tests locally:
//! ```bash
//! cargo test -- --ignored
//! ```

use std::time::Duration;

use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sqs::types::QueueAttributeName;
use testcontainers::core::WaitFor;
use testcontainers::{clients, GenericImage};

use ip_lease_queue::{
    AddressSource, AppConfig, Error, LeaseResult, QueueClient, SqsQueue, Workflow,
};

const ELASTICMQ_PORT: u16 = 9324;
const QUEUE_NAME: &str = "pool.fifo";

fn elasticmq() -> GenericImage {
    GenericImage::new("softwaremill/elasticmq-native", "1.5.7")
        .with_exposed_port(ELASTICMQ_PORT)
        .with_wait_for(WaitFor::message_on_stdout("started"))
}

fn sqs_client(endpoint: &str) -> aws_sdk_sqs::Client {
    let conf = aws_sdk_sqs::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(endpoint)
        .credentials_provider(Credentials::new("x", "x", None, None, "test"))
        .build();
    aws_sdk_sqs::Client::from_conf(conf)
}

async fn create_fifo_queue(client: &aws_sdk_sqs::Client) {
    client
        .create_queue()
        .queue_name(QUEUE_NAME)
        .attributes(QueueAttributeName::FifoQueue, "true")
        .attributes(QueueAttributeName::ContentBasedDeduplication, "true")
        .send()
        .await
        .expect("Failed to create queue");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_resolve_unknown_queue_is_not_found() {
    let docker = clients::Cli::default();
    let container = docker.run(elasticmq());
    let endpoint = format!("http://127.0.0.1:{}", container.get_host_port_ipv4(ELASTICMQ_PORT));

    let queue = SqsQueue::new(sqs_client(&endpoint));
    let err = queue
        .resolve_queue_url("missing.fifo")
        .await
        .expect_err("queue should not exist");
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_seed_then_lease_round_trip() {
    let docker = clients::Cli::default();
    let container = docker.run(elasticmq());
    let endpoint = format!("http://127.0.0.1:{}", container.get_host_port_ipv4(ELASTICMQ_PORT));

    let client = sqs_client(&endpoint);
    create_fifo_queue(&client).await;

    let config = AppConfig {
        queue_name: QUEUE_NAME.to_string(),
        seed_addresses: vec!["10.0.0.1".into(), "bogus".into(), "2001:db8::1".into()],
        ..AppConfig::default()
    };
    let source = AddressSource::Fixed(config.seed_addresses.clone());
    let workflow = Workflow::connect(SqsQueue::new(client), config, source)
        .await
        .expect("Failed to resolve queue");

    let mut out = Vec::new();
    let report = workflow
        .seed(&workflow.config().seed_addresses, &mut out)
        .await
        .expect("seed should not fail");
    assert_eq!(report.sent.len(), 2);
    assert_eq!(report.invalid, vec!["bogus"]);

    let first = workflow.lease(&mut out).await.expect("lease");
    assert_eq!(first.address(), Some("10.0.0.1"));
    let second = workflow.lease(&mut out).await.expect("lease");
    assert_eq!(second.address(), Some("2001:db8::1"));
    let third = workflow.lease(&mut out).await.expect("lease");
    assert_eq!(third, LeaseResult::Unavailable);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_received_message_carries_attributes() {
    let docker = clients::Cli::default();
    let container = docker.run(elasticmq());
    let endpoint = format!("http://127.0.0.1:{}", container.get_host_port_ipv4(ELASTICMQ_PORT));

    let client = sqs_client(&endpoint);
    create_fifo_queue(&client).await;
    let queue = SqsQueue::new(client);
    let url = queue.resolve_queue_url(QUEUE_NAME).await.expect("resolve");

    let message = ip_lease_queue::LeaseMessage::new("192.168.10.20".parse().unwrap());
    queue.send_message(&url, &message).await.expect("send");

    let received = queue
        .receive_messages(&url, 1, Duration::from_secs(30))
        .await
        .expect("receive");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, "192.168.10.20");
    assert_eq!(received[0].attributes["Name"], "IP Address");
    assert_eq!(received[0].attributes["Type"], "ipv4");
    assert_eq!(received[0].kind(), Some(ip_lease_queue::IpKind::V4));

    queue
        .delete_message(&url, &received[0].receipt_handle)
        .await
        .expect("delete");
}
