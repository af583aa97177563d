use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ragchat_core::RagError;
use serde::{Deserialize, Serialize};

/// Conversation language. Selects the prompt set used by every LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "vi")]
    Vietnamese,
    #[serde(rename = "cs")]
    Czech,
}

impl Language {
    /// Parse a language tag. Unknown tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "vi" => Language::Vietnamese,
            "cs" => Language::Czech,
            _ => Language::English,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Vietnamese => "vi",
            Language::Czech => "cs",
        }
    }
}

impl FromStr for Language {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A `{{variable}}` template. Substituted values are not rescanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String, RagError> {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after_start = &rest[start + 2..];
            if let Some(end) = after_start.find("}}") {
                let key = after_start[..end].trim();
                let value = values
                    .get(key)
                    .ok_or_else(|| RagError::Prompt(format!("missing variable: {key}")))?;
                output.push_str(value);
                rest = &after_start[end + 2..];
            } else {
                output.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }

        output.push_str(rest);
        Ok(output)
    }
}

const QUERY_GEN_EN: &str = "\
You are a skilled search query generator, dedicated to providing accurate and relevant search queries that are concise, specific, and unambiguous.
Generate {{num_queries}} unique and diverse search queries, one on each line, related to the following input query:
### Original Query: {{query}}
### Please provide search queries that are:
- Relevant to the original query
- Well-defined and specific
- Free of ambiguity and vagueness
- Useful for retrieving accurate and relevant search results
### Generated Queries:
";

const QUERY_GEN_VI: &str = "\
Bạn là một người tạo truy vấn tìm kiếm tài năng, cam kết cung cấp các truy vấn tìm kiếm chính xác và liên quan, ngắn gọn, cụ thể và không mơ hồ.
Tạo ra {{num_queries}} truy vấn tìm kiếm độc đáo và đa dạng, mỗi truy vấn trên một dòng, liên quan đến truy vấn đầu vào sau đây:
### Truy vấn Gốc: {{query}}
### Vui lòng cung cấp các truy vấn tìm kiếm mà:
- Liên quan đến truy vấn gốc
- Được xác định rõ ràng và cụ thể
- Không mơ hồ và không thể hiểu sai
- Hữu ích để lấy kết quả tìm kiếm chính xác và liên quan
### Các Truy Vấn Được Tạo Ra:
";

const QUERY_GEN_CS: &str = "\
Jste zručný generátor dotazů k vyhledávání, věnující se poskytování přesných a relevantních dotazů, které jsou stručné, specifické a jednoznačné.
Vygenerujte {{num_queries}} jedinečných a různorodých vyhledávacích dotazů, každý na jednom řádku, souvisejících s následujícím vstupním dotazem:
### Původní dotaz: {{query}}
### Uveďte prosím vyhledávací dotazy, které jsou:
- Relevantní k původnímu dotazu
- Dobře definované a specifické
- Bez nejednoznačnosti a vágnosti
- Užitečné pro získání přesných a relevantních výsledků vyhledávání
### Vygenerované dotazy:
";

const SINGLE_SELECT_EN: &str = "\
Some choices are given below. It is provided in a numbered list (1 to {{num_choices}}), where each item in the list corresponds to a summary.
---------------------
{{context_list}}
---------------------
Using only the choices above and not prior knowledge, return ONE AND ONLY ONE choice that is most relevant to the query: '{{query_str}}'
";

const SINGLE_SELECT_VI: &str = "\
Dưới đây là một số lựa chọn được đưa ra, được cung cấp trong một danh sách có số thứ tự (từ 1 đến {{num_choices}}), trong đó mỗi mục trong danh sách tương ứng với một tóm tắt.
---------------------
{{context_list}}
---------------------
Chỉ sử dụng các lựa chọn ở trên và không dùng kiến thức trước đó, hãy chọn 1 và chỉ 1 lựa chọn mà liên quan nhất đến câu truy vấn: '{{query_str}}'
";

const SINGLE_SELECT_CS: &str = "\
Níže je uvedeno několik možností. Jsou uvedeny v očíslovaném seznamu (od 1 do {{num_choices}}), kde každá položka v seznamu odpovídá shrnutí.
---------------------
{{context_list}}
---------------------
Pouze na základě výše uvedených možností a nikoli na základě předchozích znalostí, vyberte JEDNU A JEDINOU možnost, která je nejrelevantnější k dotazu: '{{query_str}}'
";

/// Query expansion prompt. Variables: `num_queries`, `query`.
pub(crate) fn query_gen_prompt(language: Language) -> PromptTemplate {
    PromptTemplate::new(match language {
        Language::English => QUERY_GEN_EN,
        Language::Vietnamese => QUERY_GEN_VI,
        Language::Czech => QUERY_GEN_CS,
    })
}

/// Single-choice selection prompt. Variables: `num_choices`, `context_list`,
/// `query_str`.
pub(crate) fn single_select_prompt(language: Language) -> PromptTemplate {
    PromptTemplate::new(match language {
        Language::English => SINGLE_SELECT_EN,
        Language::Vietnamese => SINGLE_SELECT_VI,
        Language::Czech => SINGLE_SELECT_CS,
    })
}
