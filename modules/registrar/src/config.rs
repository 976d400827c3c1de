use serde::{Deserialize, Serialize};

/// `modules.registrar` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrarConfig {
    /// Optional upper bound, in characters, for course titles and codes and
    /// student names. Unset means no limit.
    pub max_name_length: Option<usize>,
}
