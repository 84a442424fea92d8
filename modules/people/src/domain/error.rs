use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Failed to serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} did not serialize to a JSON object")]
    NotAnObject { what: &'static str },
}

impl DomainError {
    pub fn serialization(what: &'static str, source: serde_json::Error) -> Self {
        Self::Serialization { what, source }
    }
}
