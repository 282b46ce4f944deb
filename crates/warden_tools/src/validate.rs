//! Content and config validation.

use std::path::Path;

use warden_core::config::SimConfig;
use warden_core::content::ContentRegistry;

use crate::error::{read_text, Result};

/// Parse and cross-check a content file.
///
/// # Errors
///
/// Returns an error if the file is unreadable, is not valid RON, or has
/// dangling references.
pub fn validate_content_file(path: &Path) -> Result<ContentRegistry> {
    let text = read_text(path)?;
    let content = ContentRegistry::from_ron_str(&path.display().to_string(), &text)?;
    tracing::debug!("Content ok: {}", content.summary());
    Ok(content)
}

/// Parse a simulation config file.
///
/// # Errors
///
/// Returns an error if the file is unreadable or not a valid config.
pub fn load_sim_config(path: &Path) -> Result<SimConfig> {
    let text = read_text(path)?;
    Ok(SimConfig::from_ron_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use warden_core::error::CoreError;

    #[test]
    fn missing_file_names_the_path() {
        let err = validate_content_file(Path::new("/definitely/not/here.ron")).unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.ron"));
    }

    #[test]
    fn dangling_reference_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("content.ron");
        std::fs::write(
            &path,
            r#"ContentFile(items: [ItemDef(id: "seed", name: "Seed", kind: Seed(crop: "ghost"))])"#,
        )
        .expect("write");
        let err = validate_content_file(&path).unwrap_err();
        assert!(matches!(err, ToolError::Core(CoreError::InvalidContent(_))));
    }
}
