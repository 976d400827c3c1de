use serde::{Deserialize, Serialize};

/// `modules.api_ingress` section. Every field has a default so the section may be omitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiIngressConfig {
    /// Listen address; the server binary fills it from `server.host`/`server.port`
    /// when the section leaves it out.
    pub bind_addr: String,
    /// Serve `/openapi.json` and `/docs`.
    pub enable_docs: bool,
    pub cors_enabled: bool,
    /// Per-request deadline; 0 disables it.
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            enable_docs: false,
            cors_enabled: true,
            request_timeout_secs: 30,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: ApiIngressConfig =
            serde_json::from_value(serde_json::json!({ "enable_docs": true })).unwrap();
        assert!(cfg.enable_docs);
        assert!(cfg.cors_enabled);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.request_timeout_secs, 30);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res: Result<ApiIngressConfig, _> =
            serde_json::from_value(serde_json::json!({ "bind": "x" }));
        assert!(res.is_err());
    }
}
