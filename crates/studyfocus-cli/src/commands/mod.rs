pub mod config;
pub mod history;
pub mod session;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use studyfocus_core::{Backend, Config, HttpBackend, MemoryBackend};
use tracing::info;

/// Parse a JSON argument given inline or as `@path/to/file.json`.
pub fn read_json_arg<T: DeserializeOwned>(raw: &str) -> Result<T, Box<dyn std::error::Error>> {
    let content = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {path}: {e}"))?,
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&content)?)
}

/// HTTP backend when `backend.base_url` is set, otherwise a local recorder.
pub fn backend(config: &Config) -> Result<Arc<dyn Backend>, Box<dyn std::error::Error>> {
    if config.backend.is_configured() {
        let http = HttpBackend::new(
            config.backend.base_url.trim(),
            config.backend.token(),
            config.backend.timeout(),
        )?;
        Ok(Arc::new(http))
    } else {
        info!("backend.base_url not set; remote writes stay local");
        Ok(Arc::new(MemoryBackend::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyfocus_core::Task;

    #[test]
    fn json_arg_inline_and_file() {
        let inline: Task = read_json_arg(
            r#"{"id":1,"title":"Read ch. 4","description":"","estimated_minutes":30,"timer_minutes_spent":0,"subtasks":[]}"#,
        )
        .unwrap();
        assert_eq!(inline.estimated_minutes, 30);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(&path, serde_json::to_string(&inline).unwrap()).unwrap();
        let from_file: Task = read_json_arg(&format!("@{}", path.display())).unwrap();
        assert_eq!(from_file, inline);

        assert!(read_json_arg::<Task>("@/definitely/missing.json").is_err());
    }

    #[test]
    fn backend_defaults_to_local() {
        let backend = backend(&Config::default()).unwrap();
        assert_eq!(backend.name(), "memory");
    }
}
