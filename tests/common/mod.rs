#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use xml_api_client::{ApiClient, Config, Credentials};

use mocks::{MockTransport, RecordingArchive, RecordingCache, RecordingLog};

pub const CHARACTERS_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<eveapi version="2">
  <currentTime>2024-05-01 12:00:00</currentTime>
  <result>
    <rowset name="characters" key="characterID" columns="name,characterID,corporationName,corporationID">
      <row name="Alice" characterID="42" corporationName="Acme" corporationID="1000"/>
    </rowset>
  </result>
  <cachedUntil>2024-05-01 13:00:00</cachedUntil>
</eveapi>"#;

pub const AUTH_FAILURE_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<eveapi version="2">
  <currentTime>2024-05-01 12:00:00</currentTime>
  <error code="106">Authentication failure</error>
  <cachedUntil>2024-05-02 12:00:00</cachedUntil>
</eveapi>"#;

/// A client wired to recording collaborators
pub struct Harness {
    pub client: ApiClient,
    pub transport: Arc<MockTransport>,
    pub cache: Arc<RecordingCache>,
    pub archive: Arc<RecordingArchive>,
    pub log: Arc<RecordingLog>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.api.api_base = "https://api.example.com/".to_string();
    config
}

pub fn harness(transport: Arc<MockTransport>, credentials: Credentials) -> Harness {
    harness_with_config(test_config(), transport, credentials)
}

pub fn harness_with_config(
    config: Config,
    transport: Arc<MockTransport>,
    credentials: Credentials,
) -> Harness {
    let cache = RecordingCache::new();
    let archive = RecordingArchive::new();
    let log = RecordingLog::new();

    let client = ApiClient::builder(config)
        .credentials(credentials)
        .scope("account")
        .transport(transport.clone())
        .cache(cache.clone())
        .archive(archive.clone())
        .log(log.clone())
        .build()
        .unwrap();

    Harness {
        client,
        transport,
        cache,
        archive,
        log,
    }
}

pub fn user() -> Credentials {
    Credentials::new(Some(123456), Some("secretkey"))
}
