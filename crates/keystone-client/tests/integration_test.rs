//! Integration tests for the Keystone client
//!
//! These tests require a running Keystone instance.
//! Set KEYSTONE_URL, KEYSTONE_USER, KEYSTONE_PASSWORD and KEYSTONE_PROJECT to run.

use keystone_client::{AdminCredentials, KeystoneClient, KeystoneClientTrait};
use std::time::Duration;

fn client_and_credentials() -> (KeystoneClient, AdminCredentials) {
    let url = std::env::var("KEYSTONE_URL").unwrap_or_else(|_| "http://localhost:5000/v3".to_string());
    let user = std::env::var("KEYSTONE_USER").unwrap_or_else(|_| "admin".to_string());
    let password =
        std::env::var("KEYSTONE_PASSWORD").expect("KEYSTONE_PASSWORD environment variable must be set");
    let project = std::env::var("KEYSTONE_PROJECT").unwrap_or_else(|_| "admin".to_string());

    let client = KeystoneClient::new(url, Duration::from_secs(30)).expect("Failed to create client");
    (client, AdminCredentials::new(user, password, project))
}

#[tokio::test]
#[ignore] // Requires running Keystone instance
async fn test_authenticate() {
    let (client, credentials) = client_and_credentials();
    let issued = client.authenticate(&credentials).await.expect("Failed to authenticate");
    assert!(!issued.token.is_empty());
    assert!(issued.project_id.is_some());
}

#[tokio::test]
#[ignore]
async fn test_catalog_map() {
    let (client, credentials) = client_and_credentials();
    let issued = client.authenticate(&credentials).await.expect("Failed to authenticate");

    let catalog = client.catalog_map(&issued.token).await.expect("Failed to fetch catalog");
    for (region, services) in &catalog {
        println!("{}: {} services", region, services.len());
    }
    assert!(!catalog.is_empty());
}
