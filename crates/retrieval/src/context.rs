//! Synthesis context assembly
//!
//! Renders selected passages into the numbered block format the synthesis
//! prompt cites by index. Blocks are added in selection order until the
//! character budget runs out; a passage is included whole or not at all.

use scilit_config::RetrievalConfig;

use crate::rerank::RankedResult;

#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Character budget for the rendered context.
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_chars: 16_000 }
    }
}

impl From<&RetrievalConfig> for ContextConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            max_chars: config.context_max_chars,
        }
    }
}

pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Render passages as numbered evidence blocks. Returns the context
    /// string and how many passages made it in; citation indices are
    /// 1-based and match block numbers.
    pub fn build(&self, selected: &[RankedResult]) -> (String, usize) {
        let mut context = String::new();
        let mut included = 0;

        for (i, result) in selected.iter().enumerate() {
            let passage = &result.passage;
            let mut block = format!(
                "[{}] Document: {} | Section: {}",
                i + 1,
                passage.document_id,
                passage.section.as_str(),
            );
            if let Some(year) = passage.year {
                block.push_str(&format!(" | Year: {year}"));
            }
            if let Some(ref url) = passage.source_url {
                block.push_str(&format!(" | Source: {url}"));
            }
            block.push('\n');
            block.push_str(passage.text.trim());
            block.push_str("\n\n");

            if context.chars().count() + block.chars().count() > self.config.max_chars {
                break;
            }
            context.push_str(&block);
            included += 1;
        }

        (context.trim_end().to_string(), included)
    }
}
