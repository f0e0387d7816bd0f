use std::{collections::HashMap, fs};

#[derive(Debug)]
pub struct Settings {
    pub api_url: String,
    pub api_token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8888".into(),
            api_token: String::new(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("console.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Ok(v) = std::env::var("ADMIN_API_TOKEN") {
        settings.api_token = v;
    }
    if let Ok(v) = std::env::var("APP__API_TOKEN") {
        settings.api_token = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("api_url") {
            settings.api_url = v.clone();
        }
        if let Some(v) = file_cfg.get("api_token") {
            settings.api_token = v.clone();
        }
    }
}
