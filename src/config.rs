//! Broker configuration: which KMS providers are available and their
//! credentials. Read once at construction, never mutated, never logged.

/// One enabled KMS provider and the credentials the broker needs to talk to
/// it. `Aws` carries nothing beyond enablement: the actual CMK ARN and
/// region travel with each key's `KekDescriptor`, parsed from its key-vault
/// document, not from broker config.
#[derive(Clone)]
pub enum ProviderConfig {
    Aws,
    Local { master_key: [u8; 32] },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Aws => f.debug_struct("Aws").finish(),
            ProviderConfig::Local { .. } => f.debug_struct("Local").field("master_key", &"<redacted>").finish(),
        }
    }
}

/// Read-only broker configuration, naming the KMS providers a broker may
/// dispatch decryptor handles for.
#[derive(Debug, Clone, Default)]
pub struct BrokerConfig {
    providers: Vec<ProviderConfig>,
}

impl BrokerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aws(mut self) -> Self {
        self.providers.push(ProviderConfig::Aws);
        self
    }

    pub fn with_local(mut self, master_key: [u8; 32]) -> Self {
        self.providers.push(ProviderConfig::Local { master_key });
        self
    }

    pub(crate) fn aws_enabled(&self) -> bool {
        self.providers.iter().any(|p| matches!(p, ProviderConfig::Aws))
    }

    pub(crate) fn local_master_key(&self) -> Option<&[u8; 32]> {
        self.providers.iter().find_map(|p| match p {
            ProviderConfig::Local { master_key } => Some(master_key),
            ProviderConfig::Aws => None,
        })
    }
}
