use crate::compiler::normalizer::Normalizer;
use crate::compiler::validator::Validator;
use crate::error::MigrationError;
use crate::flow::{FlowVersion, LegacyFlowVersion, SchemaVersion};
use serde_json::Value;
use tracing::{debug, info};

/// Deepest object/array nesting a record may have. Legacy chains nest one
/// level per step and decoding recurses per level.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Moves a nested flow version to the flat step layout.
pub struct FlattenSteps;

impl FlattenSteps {
    pub fn new() -> Self {
        Self
    }

    pub fn target_version(&self) -> SchemaVersion {
        SchemaVersion::FLAT_STEPS
    }

    /// Normalizes and validates. On error the caller keeps the old record.
    pub fn apply(&self, legacy: LegacyFlowVersion) -> Result<FlowVersion, MigrationError> {
        let (trigger, steps) = Normalizer::new().normalize(&legacy.trigger);

        Validator::validate_against(&legacy.trigger, &trigger, &steps).map_err(|source| {
            MigrationError::Integrity {
                id: legacy.id.clone(),
                source,
            }
        })?;

        info!(
            flow_version = %legacy.id,
            from = %legacy.schema_version,
            to = %self.target_version(),
            steps = steps.len(),
            "Flattened flow version"
        );

        Ok(FlowVersion {
            id: legacy.id,
            display_name: legacy.display_name,
            schema_version: self.target_version(),
            trigger,
            steps,
        })
    }
}

impl Default for FlattenSteps {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of passing a stored record through the schema gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Upgrade {
    /// The record was nested and has been flattened.
    Migrated(FlowVersion),
    /// The record was already flat and was left untouched.
    Current(FlowVersion),
}

impl Upgrade {
    pub fn into_flow_version(self) -> FlowVersion {
        match self {
            Upgrade::Migrated(v) | Upgrade::Current(v) => v,
        }
    }

    pub fn flow_version(&self) -> &FlowVersion {
        match self {
            Upgrade::Migrated(v) | Upgrade::Current(v) => v,
        }
    }

    pub fn is_migrated(&self) -> bool {
        matches!(self, Upgrade::Migrated(_))
    }
}

/// Reads `schemaVersion` and flattens the record only if it is still nested.
/// Flat records are never normalized again.
pub fn upgrade_record(record: Value) -> Result<Upgrade, MigrationError> {
    let (version, record) = checked_version(record)?;

    if version.is_nested() {
        let legacy: LegacyFlowVersion = serde_json::from_value(record)?;
        return FlattenSteps::new().apply(legacy).map(Upgrade::Migrated);
    }

    debug!(schema_version = %version, "Record already uses flat steps");
    Ok(Upgrade::Current(serde_json::from_value(record)?))
}

/// Decodes a record that must already be flat.
pub fn decode_flat(record: Value) -> Result<FlowVersion, MigrationError> {
    let (version, record) = checked_version(record)?;
    if version.is_nested() {
        return Err(MigrationError::NotFlat { found: version });
    }
    Ok(serde_json::from_value(record)?)
}

/// Rejects unknown future versions and rewrites the version as a number.
fn checked_version(mut record: Value) -> Result<(SchemaVersion, Value), MigrationError> {
    if exceeds_depth(&record, MAX_NESTING_DEPTH) {
        return Err(MigrationError::TooDeep {
            limit: MAX_NESTING_DEPTH,
        });
    }
    let version = schema_version_of(&record)?;
    if version > SchemaVersion::CURRENT {
        return Err(MigrationError::UnsupportedSchemaVersion {
            found: version,
            supported: SchemaVersion::CURRENT,
        });
    }
    record["schemaVersion"] = Value::from(version.0);
    Ok((version, record))
}

/// Accepts the version as a number or a numeric string.
pub fn schema_version_of(record: &Value) -> Result<SchemaVersion, MigrationError> {
    let raw = record
        .get("schemaVersion")
        .ok_or(MigrationError::MissingSchemaVersion)?;

    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|v| u32::try_from(v).ok())
        .map(SchemaVersion)
        .ok_or(MigrationError::MissingSchemaVersion)
}

fn exceeds_depth(record: &Value, limit: usize) -> bool {
    let mut pending = vec![(record, 1)];
    while let Some((value, depth)) = pending.pop() {
        match value {
            Value::Object(_) | Value::Array(_) if depth > limit => return true,
            Value::Object(map) => pending.extend(map.values().map(|v| (v, depth + 1))),
            Value::Array(items) => pending.extend(items.iter().map(|v| (v, depth + 1))),
            _ => {}
        }
    }
    false
}
