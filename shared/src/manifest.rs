//! AI plugin manifest served at `/.well-known/ai-plugin.json`.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PluginManifest {
    pub schema_version: &'static str,
    pub name_for_human: &'static str,
    pub name_for_model: &'static str,
    pub description_for_human: &'static str,
    pub description_for_model: &'static str,
    pub auth: PluginAuth,
    pub api: PluginApi,
    pub logo_url: String,
    pub contact_email: &'static str,
    pub legal_info_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PluginAuth {
    #[serde(rename = "type")]
    pub auth_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PluginApi {
    #[serde(rename = "type")]
    pub api_type: &'static str,
    pub url: String,
    pub is_user_authenticated: bool,
}

impl PluginManifest {
    /// Manifest pointing at the deployment reachable under `base_url`.
    pub fn for_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');

        Self {
            schema_version: "v1",
            name_for_human: "Copilot Demo API",
            name_for_model: "copilot_demo",
            description_for_human: "Cross-platform demo: Graph users, health, logs, and events.",
            description_for_model: "Use this API to fetch Microsoft 365 users, check system health, \
                manage logs, summarize log files, and read Windows/Linux events.",
            auth: PluginAuth { auth_type: "none" },
            api: PluginApi {
                api_type: "openapi",
                url: format!("{}/openapi.json", base),
                is_user_authenticated: false,
            },
            logo_url: format!("{}/static/logo.png", base),
            contact_email: "admin@yourdomain.com",
            legal_info_url: "https://yourdomain.com/legal",
        }
    }
}
