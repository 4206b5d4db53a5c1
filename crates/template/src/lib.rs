//! Prompt template loading and rendering.
//!
//! A template is a text file with `{{system}}`, `{{instruction}}`, and
//! `{{content}}` placeholders, looked up as `<templates_directory>/<name>.txt`.
//! When no template file is configured, a built-in instruct-style template
//! is used. Rendering is plain placeholder substitution; anything fancier
//! belongs server-side.

use std::path::{Path, PathBuf};
use textmill_core::error::TemplateError;
use textmill_core::template::PromptTemplate;
use tracing::debug;

/// The built-in instruct-style template.
const BUILTIN_TEMPLATE: &str = "\
{{system}}

### Instruction:
{{instruction}}

{{content}}

### Response:
";

/// A prompt template backed by a file (or the built-in default).
#[derive(Debug)]
pub struct FileTemplate {
    name: String,
    body: String,
}

impl FileTemplate {
    /// Load `<templates_directory>/<name>.txt`.
    pub fn load(templates_directory: &Path, name: &str) -> Result<Self, TemplateError> {
        let path: PathBuf = templates_directory.join(format!("{name}.txt"));
        if !path.exists() {
            return Err(TemplateError::NotFound(path));
        }

        let body = std::fs::read_to_string(&path).map_err(|e| TemplateError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!(template = name, path = %path.display(), "Loaded prompt template");
        Ok(Self {
            name: name.to_string(),
            body,
        })
    }

    /// The built-in instruct-style template.
    pub fn builtin() -> Self {
        Self {
            name: "builtin".into(),
            body: BUILTIN_TEMPLATE.into(),
        }
    }

    /// Load the configured template, or fall back to the built-in one when
    /// no name is configured.
    pub fn from_config(
        templates_directory: &Path,
        name: Option<&str>,
    ) -> Result<Self, TemplateError> {
        match name {
            Some(name) => Self::load(templates_directory, name),
            None => Ok(Self::builtin()),
        }
    }
}

impl PromptTemplate for FileTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn wrap(
        &self,
        instruction: &str,
        content: &str,
        system_instruction: &str,
    ) -> Result<Vec<String>, TemplateError> {
        let rendered = self
            .body
            .replace("{{system}}", system_instruction)
            .replace("{{instruction}}", instruction)
            .replace("{{content}}", content);

        if rendered.trim().is_empty() {
            return Err(TemplateError::EmptyRender);
        }

        Ok(vec![rendered])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_renders_all_three_fields() {
        let template = FileTemplate::builtin();
        let prompts = template
            .wrap("Summarize the text.", "A long passage.", "You are a helpful assistant.")
            .unwrap();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("Summarize the text."));
        assert!(prompt.contains("A long passage."));
        assert!(prompt.contains("You are a helpful assistant."));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn file_template_loads_and_renders() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("chatml.txt")).unwrap();
        write!(
            file,
            "<|im_start|>system\n{{{{system}}}}<|im_end|>\n<|im_start|>user\n{{{{instruction}}}}\n\n{{{{content}}}}<|im_end|>\n<|im_start|>assistant\n"
        )
        .unwrap();

        let template = FileTemplate::load(dir.path(), "chatml").unwrap();
        assert_eq!(template.name(), "chatml");

        let prompts = template.wrap("Translate.", "Bonjour.", "Assist.").unwrap();
        assert!(prompts[0].contains("<|im_start|>user"));
        assert!(prompts[0].contains("Bonjour."));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileTemplate::load(dir.path(), "missing").unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }

    #[test]
    fn empty_template_is_rejected_at_render() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank.txt"), "{{content}}").unwrap();

        let template = FileTemplate::load(dir.path(), "blank").unwrap();
        let err = template.wrap("", "", "").unwrap_err();
        assert!(matches!(err, TemplateError::EmptyRender));
    }

    #[test]
    fn from_config_without_name_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let template = FileTemplate::from_config(dir.path(), None).unwrap();
        assert_eq!(template.name(), "builtin");
    }
}
