use std::time::Duration;

use konjure_core::Node;
use konjure_core::spec::HttpSpec;
use konjure_core::yaml::parse_documents;

use super::Reader;
use crate::error::{EngineError, Result};

/// Fetches a YAML document stream over HTTP(S)
pub struct HttpReader {
    spec: HttpSpec,
}

impl HttpReader {
    pub fn new(spec: HttpSpec) -> Self {
        Self { spec }
    }
}

impl Reader for HttpReader {
    fn read(&mut self) -> Result<Vec<Node>> {
        let url = &self.spec.url;
        tracing::debug!(%url, "fetching resources");

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("konjure/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let response = client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        Ok(parse_documents(&body)?)
    }
}
