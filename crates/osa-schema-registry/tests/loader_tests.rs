//! Bulk-registration tests over a real directory and a mocked registry.

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use osa_schema_registry::{register_all_from_dir, RegistryConfig, SchemaRegistryClient, SchemaType};

struct SchemaDir {
    path: PathBuf,
}

impl SchemaDir {
    fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "osa-schema-loader-{label}-{}",
            uuid::Uuid::new_v4()
        ));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.path.join(name), contents).unwrap();
    }
}

impl Drop for SchemaDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

async fn client_for(server: &MockServer) -> SchemaRegistryClient {
    let config = RegistryConfig::builder()
        .base_url(server.uri())
        .build()
        .unwrap();
    SchemaRegistryClient::new(config).unwrap()
}

#[tokio::test]
async fn test_registers_every_matching_definition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/subjects/workflow.started-value/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "version": 1 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/subjects/workflow.finished-value/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2, "version": 1 })))
        .mount(&server)
        .await;

    let dir = SchemaDir::new("all");
    dir.write("workflow.started.avsc", r#"{"type":"record","name":"Started","fields":[]}"#);
    dir.write("workflow.finished.avsc", r#"{"type":"record","name":"Finished","fields":[]}"#);
    dir.write("README.md", "not a schema");

    let client = client_for(&server).await;
    let report = register_all_from_dir(&client, &dir.path, SchemaType::Avro)
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.registered.len(), 2);
    let mut subjects: Vec<_> = report.registered.iter().map(|r| r.subject.clone()).collect();
    subjects.sort();
    assert_eq!(
        subjects,
        vec!["workflow.finished-value", "workflow.started-value"]
    );
}

#[tokio::test]
async fn test_one_rejected_definition_does_not_block_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/subjects/workflow.started-value/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "version": 1 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/subjects/workflow.broken-value/versions"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid schema"))
        .mount(&server)
        .await;

    let dir = SchemaDir::new("partial");
    dir.write("workflow.started.avsc", r#"{"type":"record","name":"Started","fields":[]}"#);
    dir.write("workflow.broken.avsc", "not json at all");

    let client = client_for(&server).await;
    let report = register_all_from_dir(&client, &dir.path, SchemaType::Avro)
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.registered.len(), 1);
    assert_eq!(report.registered[0].subject, "workflow.started-value");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "workflow.broken-value");
}

#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    let result = register_all_from_dir(
        &client,
        std::env::temp_dir().join("osa-schema-loader-does-not-exist"),
        SchemaType::Avro,
    )
    .await;
    assert!(result.is_err());
}
