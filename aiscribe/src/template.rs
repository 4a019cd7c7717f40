use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// A named pair of system/user prompt strings steering the chat call.
/// Static configuration, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The template catalog: builtins plus optional user templates merged from
/// a JSON file.
pub struct TemplateCatalog {
    templates: BTreeMap<String, PromptTemplate>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// The builtin catalog.
    pub fn builtin() -> Self {
        Self {
            templates: builtin_templates(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    /// Lookup that fails with `TemplateNotFound`.
    pub fn require(&self, id: &str) -> Result<&PromptTemplate> {
        self.get(id)
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PromptTemplate)> {
        self.templates.iter().map(|(id, t)| (id.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// All distinct categories, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self
            .templates
            .values()
            .map(|t| t.category.as_str())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Case-insensitive keyword search over name, description, and tags.
    pub fn search(&self, keyword: &str) -> Vec<(&str, &PromptTemplate)> {
        let keyword = keyword.to_lowercase();
        self.templates
            .iter()
            .filter(|(_, t)| {
                t.name.to_lowercase().contains(&keyword)
                    || t.description.to_lowercase().contains(&keyword)
                    || t.tags.iter().any(|tag| tag.to_lowercase().contains(&keyword))
            })
            .map(|(id, t)| (id.as_str(), t))
            .collect()
    }

    /// Merge user templates from a JSON file (a map of id → template).
    /// Existing ids are skipped unless `overwrite` is set; templates with
    /// an empty name or prompt are skipped. Returns the number merged.
    pub fn merge_file(&mut self, path: &Path, overwrite: bool) -> Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let incoming: BTreeMap<String, PromptTemplate> = serde_json::from_str(&raw)?;

        let mut merged = 0;
        for (id, template) in incoming {
            if template.name.trim().is_empty() || template.user_prompt.trim().is_empty() {
                warn!(%id, "skipping template without name or user prompt");
                continue;
            }
            if self.templates.contains_key(&id) && !overwrite {
                warn!(%id, "template already exists, skipping");
                continue;
            }
            self.templates.insert(id, template);
            merged += 1;
        }

        info!(merged, path = %path.display(), "user templates loaded");
        Ok(merged)
    }
}

fn builtin_templates() -> BTreeMap<String, PromptTemplate> {
    let mut templates = BTreeMap::new();

    templates.insert(
        "meeting_notes".into(),
        PromptTemplate {
            name: "Meeting notes".into(),
            description: "Turn a meeting recording transcript into structured minutes".into(),
            system_prompt: Some(
                "You are a professional minute-taker who turns raw meeting transcripts \
                 into clear, structured meeting notes."
                    .into(),
            ),
            user_prompt: "Rewrite the following meeting transcript as formal meeting notes:\n\
                          \n\
                          1. Basic facts, where mentioned: date, attendees, purpose.\n\
                          2. Discussion grouped by topic, with decisions and conclusions highlighted.\n\
                          3. Action items with owners and deadlines.\n\
                          4. Concise written style; drop filler speech; bold the key points.\n\
                          \n\
                          Keep the content accurate and complete."
                .into(),
            category: "business".into(),
            tags: vec!["meeting".into(), "minutes".into(), "business".into()],
        },
    );

    templates.insert(
        "study_notes".into(),
        PromptTemplate {
            name: "Study notes".into(),
            description: "Turn a lecture or course recording into structured study notes".into(),
            system_prompt: Some(
                "You are a study assistant who organizes course material into clear, \
                 reviewable notes."
                    .into(),
            ),
            user_prompt: "Organize the following course content into structured study notes:\n\
                          \n\
                          1. Extract the core concepts and build a logical outline.\n\
                          2. Use heading levels, lists, and bold for key terms.\n\
                          3. Add short summaries and memory hooks where useful.\n\
                          4. Remove repetition and keep the wording precise.\n\
                          \n\
                          The notes should be accurate and easy to revise from."
                .into(),
            category: "education".into(),
            tags: vec!["study".into(), "notes".into(), "education".into()],
        },
    );

    templates.insert(
        "content_summary".into(),
        PromptTemplate {
            name: "Summary".into(),
            description: "Extract the core of a text into a concise summary".into(),
            system_prompt: Some(
                "You are a professional editor who distills text into clear, faithful \
                 summaries."
                    .into(),
            ),
            user_prompt: "Summarize the following content:\n\
                          \n\
                          1. Keep the main points and important figures, drop minor detail.\n\
                          2. Order by importance, in short paragraphs.\n\
                          3. Aim for 20-30% of the original length.\n\
                          4. Stay faithful to the source; no invented claims."
                .into(),
            category: "editing".into(),
            tags: vec!["summary".into(), "digest".into()],
        },
    );

    templates.insert(
        "interview_transcript".into(),
        PromptTemplate {
            name: "Interview transcript".into(),
            description: "Clean an interview recording into a publishable Q&A transcript".into(),
            system_prompt: Some(
                "You are an interview editor who turns raw recordings into clean, \
                 well-structured transcripts."
                    .into(),
            ),
            user_prompt: "Edit the following interview transcript into a publishable form:\n\
                          \n\
                          1. Separate interviewer and interviewee turns clearly.\n\
                          2. Remove filler words; fix grammar without changing meaning.\n\
                          3. Keep the natural flow and the order of the conversation.\n\
                          4. Use a standard interview layout with speakers labeled."
                .into(),
            category: "media".into(),
            tags: vec!["interview".into(), "dialogue".into(), "media".into()],
        },
    );

    templates.insert(
        "lecture_notes".into(),
        PromptTemplate {
            name: "Lecture write-up".into(),
            description: "Turn a talk recording into a complete written lecture".into(),
            system_prompt: Some(
                "You are an editor who converts spoken talks into complete written \
                 lecture texts."
                    .into(),
            ),
            user_prompt: "Convert the following talk transcript into a written lecture:\n\
                          \n\
                          1. Extract the theme and core arguments into a clear structure.\n\
                          2. Convert spoken phrasing to written prose, keeping the \
                          speaker's voice.\n\
                          3. Add headings and mark notable quotes.\n\
                          4. Smooth transitions so the text reads as a whole."
                .into(),
            category: "education".into(),
            tags: vec!["lecture".into(), "talk".into(), "education".into()],
        },
    );

    templates.insert(
        "support_call_log".into(),
        PromptTemplate {
            name: "Support call log".into(),
            description: "Turn a support call recording into a service record".into(),
            system_prompt: Some(
                "You are a support-desk scribe who turns call recordings into objective \
                 service records."
                    .into(),
            ),
            user_prompt: "Write a service record from the following support call transcript:\n\
                          \n\
                          1. Customer situation and the request or complaint.\n\
                          2. Nature and urgency of the problem, with relevant background.\n\
                          3. How the agent responded and the final resolution.\n\
                          4. Objective, professional wording suitable for follow-up."
                .into(),
            category: "business".into(),
            tags: vec!["support".into(), "call".into(), "record".into()],
        },
    );

    templates.insert(
        "text_cleanup".into(),
        PromptTemplate {
            name: "Text cleanup".into(),
            description: "Basic cleanup and formatting of a raw transcript".into(),
            system_prompt: Some(
                "You are a careful copy editor who cleans up raw text without changing \
                 its meaning."
                    .into(),
            ),
            user_prompt: "Clean up the following text:\n\
                          \n\
                          1. Remove duplicated and redundant passages.\n\
                          2. Fix obvious grammar and punctuation issues.\n\
                          3. Break into readable paragraphs.\n\
                          4. Preserve the original meaning exactly."
                .into(),
            category: "editing".into(),
            tags: vec!["cleanup".into(), "formatting".into()],
        },
    );

    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_builtin_catalog_contents() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.len(), 7);
        assert!(catalog.get("meeting_notes").is_some());
        assert!(catalog.get("content_summary").is_some());
        assert!(catalog.get("text_cleanup").is_some());
    }

    #[test]
    fn test_require_unknown_template() {
        let catalog = TemplateCatalog::builtin();
        let err = catalog.require("no_such_template").unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
        assert!(err.to_string().contains("no_such_template"));
    }

    #[test]
    fn test_categories_sorted_and_deduped() {
        let catalog = TemplateCatalog::builtin();
        let categories = catalog.categories();
        assert!(categories.contains(&"business"));
        assert!(categories.contains(&"education"));
        let mut sorted = categories.clone();
        sorted.sort_unstable();
        assert_eq!(categories, sorted);
        assert_eq!(
            categories.len(),
            {
                let mut deduped = categories.clone();
                deduped.dedup();
                deduped.len()
            }
        );
    }

    #[test]
    fn test_search_matches_name_and_tags() {
        let catalog = TemplateCatalog::builtin();
        let by_name = catalog.search("meeting");
        assert!(by_name.iter().any(|(id, _)| *id == "meeting_notes"));
        let by_tag = catalog.search("DIGEST");
        assert!(by_tag.iter().any(|(id, _)| *id == "content_summary"));
        assert!(catalog.search("zzz-no-match").is_empty());
    }

    #[test]
    fn test_merge_file_skips_existing_without_overwrite() {
        let path = std::env::temp_dir().join("aiscribe_test_templates.json");
        fs::write(
            &path,
            r#"{
                "meeting_notes": { "name": "Override", "user_prompt": "p" },
                "my_custom": { "name": "Custom", "user_prompt": "Do the thing." }
            }"#,
        )
        .unwrap();

        let mut catalog = TemplateCatalog::builtin();
        let merged = catalog.merge_file(&path, false).unwrap();
        assert_eq!(merged, 1);
        assert_ne!(catalog.get("meeting_notes").unwrap().name, "Override");
        assert_eq!(catalog.get("my_custom").unwrap().name, "Custom");

        let merged = catalog.merge_file(&path, true).unwrap();
        assert_eq!(merged, 2);
        assert_eq!(catalog.get("meeting_notes").unwrap().name, "Override");

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_merge_file_skips_invalid_templates() {
        let path = std::env::temp_dir().join("aiscribe_test_templates_invalid.json");
        fs::write(
            &path,
            r#"{ "bad": { "name": "", "user_prompt": "p" } }"#,
        )
        .unwrap();

        let mut catalog = TemplateCatalog::builtin();
        let merged = catalog.merge_file(&path, false).unwrap();
        assert_eq!(merged, 0);
        assert!(catalog.get("bad").is_none());

        fs::remove_file(&path).ok();
    }
}
