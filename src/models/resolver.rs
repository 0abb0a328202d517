use crate::error::ResolutionAnomaly;
use crate::metadata::{BackendSpec, MetadataRecord};
use crate::models::capability::CapabilityProfile;

/// Description used when a record carries none
pub const NO_DESCRIPTION: &str = "<no description provided>";

/// A model family expanded into concrete artifact filenames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub files: Vec<String>,
}

impl ResolvedModel {
    /// `{id}-{version}` token used by include filters and listings
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.id, self.version)
    }
}

/// Expands metadata records for one backend and optional hardware profile
#[derive(Debug, Clone)]
pub struct ModelResolver {
    backend: String,
    capability: Option<CapabilityProfile>,
}

impl ModelResolver {
    #[must_use]
    pub fn new(backend: impl Into<String>, capability: Option<CapabilityProfile>) -> Self {
        Self {
            backend: backend.into(),
            capability,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Resolve a record, absorbing anomalies into an empty file list
    #[must_use]
    pub fn resolve(&self, record: &MetadataRecord) -> ResolvedModel {
        let mut model = Self::describe(record);

        match self.try_files(record) {
            Ok(files) => model.files = files,
            Err(anomaly @ ResolutionAnomaly::OddBlockCount { .. }) => {
                tracing::warn!("Dropping model: {anomaly}");
            }
            Err(anomaly) => tracing::debug!("{anomaly}"),
        }

        model
    }

    /// Resolve a record, reporting malformed metadata as an error
    pub fn try_resolve(
        &self,
        record: &MetadataRecord,
    ) -> std::result::Result<ResolvedModel, ResolutionAnomaly> {
        let files = self.try_files(record)?;
        Ok(ResolvedModel {
            files,
            ..Self::describe(record)
        })
    }

    /// Resolve all records, dropping models without files for this backend
    pub fn resolve_all<'a>(
        &'a self,
        records: &'a [MetadataRecord],
    ) -> impl Iterator<Item = ResolvedModel> + 'a {
        records
            .iter()
            .map(|record| self.resolve(record))
            .filter(|model| !model.files.is_empty())
    }

    fn describe(record: &MetadataRecord) -> ResolvedModel {
        let name = [record.gui.name.as_deref(), record.display_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or(record.id.as_str())
            .to_string();

        let description = record
            .gui
            .desc
            .clone()
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        ResolvedModel {
            id: record.id.clone(),
            version: record.version.clone(),
            name,
            description,
            files: Vec::new(),
        }
    }

    fn try_files(
        &self,
        record: &MetadataRecord,
    ) -> std::result::Result<Vec<String>, ResolutionAnomaly> {
        let spec = record.backends.get(&self.backend).ok_or_else(|| {
            ResolutionAnomaly::UnknownBackend {
                model: record.id.clone(),
                backend: self.backend.clone(),
            }
        })?;

        if let Some((scale, len)) = spec
            .scales
            .iter()
            .map(|(label, scale)| (label, scale.blocks.len()))
            .find(|(_, len)| len % 2 != 0)
        {
            return Err(ResolutionAnomaly::OddBlockCount {
                model: record.id.clone(),
                scale: scale.clone(),
                len,
            });
        }

        if !self.is_permitted(spec) {
            tracing::debug!(
                "Skipping {}: backend {} requires one of {:?}",
                record.id,
                self.backend,
                spec.capabilities
            );
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for (label, scale) in &spec.scales {
            for net in &scale.nets {
                for pair in scale.blocks.chunks_exact(2) {
                    let suffix = self.substitute(net, label, pair[0], pair[1]);
                    files.push(format!("{}-v{}-{suffix}", record.id, record.version));
                }
            }
        }

        Ok(files)
    }

    // Capability-gated variants need a profile whose family is listed
    fn is_permitted(&self, spec: &BackendSpec) -> bool {
        if spec.capabilities.is_empty() {
            return true;
        }
        self.capability
            .is_some_and(|profile| spec.capabilities.contains(&profile.hardware_family_code))
    }

    fn substitute(&self, net: &str, scale: &str, height: i64, width: i64) -> String {
        let name = net
            .replace("[H]", &height.to_string())
            .replace("[W]", &width.to_string())
            .replace("[S]", scale);

        match self.capability {
            Some(profile) => name
                .replace("[R]", &profile.runtime_platform_code.to_string())
                .replace("[C]", &profile.hardware_family_code.to_string()),
            None => name,
        }
    }
}
