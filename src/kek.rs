use crate::error::{BrokerError, BrokerResult};

/// KEK (key encryption key) descriptor, parsed out of a key document's
/// `masterKey` sub-document. Only `aws` and `local` providers are modeled;
/// an unrecognized `provider` is a malformed-document error rather than
/// silently falling through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KekDescriptor {
    Aws { key_arn: String, region: String },
    Local,
}

impl KekDescriptor {
    pub(crate) fn from_bson(doc: &bson::Document) -> BrokerResult<Self> {
        let provider = doc
            .get_str("provider")
            .map_err(|_| BrokerError::MalformedKeyDocument("masterKey.provider missing".into()))?;

        match provider {
            "aws" => {
                let key_arn = doc
                    .get_str("key")
                    .map_err(|_| {
                        BrokerError::MalformedKeyDocument("masterKey.key missing for aws".into())
                    })?
                    .to_string();
                let region = doc
                    .get_str("region")
                    .map_err(|_| {
                        BrokerError::MalformedKeyDocument(
                            "masterKey.region missing for aws".into(),
                        )
                    })?
                    .to_string();
                Ok(KekDescriptor::Aws { key_arn, region })
            }
            "local" => Ok(KekDescriptor::Local),
            other => Err(BrokerError::MalformedKeyDocument(format!(
                "unsupported KMS provider: {other}"
            ))),
        }
    }

    pub fn provider_tag(&self) -> &'static str {
        match self {
            KekDescriptor::Aws { .. } => "aws",
            KekDescriptor::Local => "local",
        }
    }
}
