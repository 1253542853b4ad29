// ABOUTME: Integration tests for tether-codegen.
// ABOUTME: Generates adapters for the petstore fixture and checks the emitted files.

use std::fs;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tether_codegen::{inspect, GenerateConfig, Generator, Shape};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/petstore.proto")
}

fn config(out: &TempDir) -> GenerateConfig {
    let mut config = GenerateConfig::new(fixture(), out.path().join("adapters"));
    config.skip_compile = true;
    config
}

#[test]
fn test_inspect_fixture() {
    let file = inspect(&fixture()).unwrap();
    assert_eq!(file.package.as_deref(), Some("petstore"));

    let services: Vec<&str> = file.services.iter().map(|s| s.proto_name.as_str()).collect();
    assert_eq!(services, vec!["PetStoreService", "UserService"]);

    let shapes: Vec<(&str, Shape)> = file.services[0]
        .methods
        .iter()
        .map(|m| (m.proto_name.as_str(), m.shape()))
        .collect();
    assert_eq!(
        shapes,
        vec![
            ("PetById", Shape::Unary),
            ("ListPets", Shape::ServerStreaming),
            ("UploadPets", Shape::ClientStreaming),
        ]
    );
    assert_eq!(file.services[1].methods[0].shape(), Shape::Bidirectional);
}

#[test]
fn test_generate_fixture_adapters() {
    let out = TempDir::new().unwrap();
    let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let report = Generator::new(config(&out)).run_at(timestamp).unwrap();

    assert!(!report.compiled);
    assert_eq!(report.files.len(), 4);

    let dir = out.path().join("adapters");
    let server = fs::read_to_string(dir.join("petstore.PetStoreService.server.tether.rs")).unwrap();
    assert!(server.contains("impl PetStoreService for PetStoreServiceTrigger {"));
    assert!(server.contains("async fn pet_by_id("));
    assert!(server.contains("type ListPetsStream = ResponseStream<super::Pet>;"));
    assert!(server.contains("request: Request<super::EmptyReq>,"));
    assert!(server.contains(
        "server::client_streaming(&self.handler, &SERVICE_INFO, \"UploadPets\", request)"
    ));

    let client = fs::read_to_string(dir.join("petstore.UserService.client.tether.rs")).unwrap();
    assert!(client.contains("use super::user_service_client::UserServiceClient;"));
    assert!(client.contains("client::invoke_bidirectional::<super::User, super::User, _, _, _>"));
    assert!(client.contains("client::invoke_unary::<super::User, super::User, _, _>"));
    assert!(client.contains("ServiceInfo::new(\"petstore\", \"UserService\")"));
}

#[test]
fn test_generation_is_repeatable() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let a = Generator::new(config(&first)).run_at(timestamp).unwrap();
    let b = Generator::new(config(&second)).run_at(timestamp).unwrap();

    for (left, right) in a.files.iter().zip(&b.files) {
        assert_eq!(left.file_name(), right.file_name());
        assert_eq!(
            fs::read_to_string(left).unwrap(),
            fs::read_to_string(right).unwrap()
        );
    }
}

#[test]
fn test_custom_runtime_and_proto_module_paths() {
    let out = TempDir::new().unwrap();
    let mut config = config(&out);
    config.runtime_crate = "crate::rt".to_string();
    config.proto_module = "crate::pb".to_string();

    let report = Generator::new(config).run().unwrap();
    let server = fs::read_to_string(&report.files[0]).unwrap();
    assert!(server.contains("use crate::rt::server;"));
    assert!(server.contains(
        "use crate::pb::pet_store_service_server::{PetStoreService, PetStoreServiceServer};"
    ));
    assert!(server.contains("Request<crate::pb::PetRequest>"));
}
