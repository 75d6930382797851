use crate::domain::model::GenerateRequest;
use crate::domain::ports::GenerativeModel;
use crate::utils::error::{Result, ServerError};
use std::sync::Arc;

pub const DEFAULT_JURISDICTION: &str = "US";

pub fn build_prompt(clause: &str, location: &str) -> String {
    format!(
        r#"
You are a highly precise legal research assistant with expertise in case law and legal precedents.

Given the clause below, identify the most relevant and authoritative legal precedents from the specified jurisdiction.

INSTRUCTIONS:
- Focus primarily on the specified jurisdiction: "{location}"
- If the location is a specific state (e.g., California, New York), prioritize state-specific cases but also include relevant federal precedents
- If the location is a country (e.g., US, India, UK), include the most significant national and high court precedents
- Only include precedents that are directly relevant to the legal principles in the clause
- Prioritize landmark cases and frequently cited precedents
- Exclude cases that are merely tangentially related

For each precedent, provide:
1. **Case Name** (with official citation if available)
2. **Year** of decision
3. **Court/Jurisdiction** (specify court level and jurisdiction)
4. **Relevance** (2-3 sentences explaining the direct connection to the clause)
5. **Key Principle** (the specific legal principle established)

Format your response as a numbered list with clear sections for each precedent.

**Legal Clause to Analyze:**
"{clause}"

**Target Jurisdiction:** {location}
"#
    )
}

pub struct PrecedentFinder {
    model: Arc<dyn GenerativeModel>,
}

impl PrecedentFinder {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Formatted precedent analysis for `clause` in `location`.
    pub async fn find_precedents(&self, clause: &str, location: &str) -> Result<String> {
        let clause = clause.trim();
        if clause.is_empty() {
            return Err(ServerError::validation("No clause provided for analysis."));
        }
        let location = match location.trim() {
            "" => DEFAULT_JURISDICTION,
            other => other,
        };

        let request = GenerateRequest::from_prompt(build_prompt(clause, location));
        let response = self.model.generate(&request).await?;

        let text: String = response
            .first_content()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            tracing::warn!("{} returned no precedent text", self.model.model_name());
            return Ok(format!(
                "No precedents could be identified for the given clause in jurisdiction: {}",
                location
            ));
        }
        Ok(text.to_string())
    }
}
