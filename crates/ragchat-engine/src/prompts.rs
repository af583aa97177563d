use ragchat_retrieval::{Language, PromptTemplate};

const SYSTEM_EN: &str = "\
This is a chat between a user and an artificial intelligence assistant. \
The assistant gives helpful, detailed, and polite answers to the user's questions based on the context. \
The assistant should also indicate when the answer cannot be found in the context.";

const SYSTEM_VI: &str = "\
Đây là một cuộc trò chuyện giữa người dùng và một trợ lí trí tuệ nhân tạo. \
Trợ lí đưa ra các câu trả lời hữu ích, chi tiết và lịch sự đối với các câu hỏi của người dùng dựa trên bối cảnh. \
Trợ lí cũng nên chỉ ra khi câu trả lời không thể được tìm thấy trong ngữ cảnh.";

const SYSTEM_CS: &str = "\
Toto je rozhovor mezi uživatelem a umělou inteligencí. \
Asistent poskytuje užitečné, podrobné a zdvořilé odpovědi na otázky uživatele na základě kontextu. \
Asistent by měl také uvést, když odpověď nelze nalézt v kontextu.";

const CONTEXT_EN: &str = "\
Here are the relevant documents for the context:

{{context_str}}

Instruction: Based on the above documents, provide a detailed answer for the user question below. \
Answer 'don't know' if not present in the document.";

const CONTEXT_VI: &str = "\
Dưới đây là các tài liệu liên quan cho ngữ cảnh:

{{context_str}}

Hướng dẫn: Dựa trên các tài liệu trên, cung cấp một câu trả lời chi tiết cho câu hỏi của người dùng dưới đây. \
Trả lời 'không biết' nếu không có trong tài liệu.";

const CONTEXT_CS: &str = "\
Zde jsou relevantní dokumenty pro kontext:

{{context_str}}

Instrukce: Na základě výše uvedených dokumentů poskytněte podrobnou odpověď na otázku uživatele níže. \
Odpovězte 'nevím', pokud to není uvedeno v dokumentu.";

const CONDENSE_EN: &str = "\
Given the following conversation between a user and an AI assistant and a follow up question from user,
rephrase the follow up question to be a standalone question.

Chat History:
{{chat_history}}
Follow Up Input: {{question}}
Standalone question:";

const CONDENSE_VI: &str = "\
Cho cuộc trò chuyện sau giữa một người dùng và một trợ lí trí tuệ nhân tạo và một câu hỏi tiếp theo từ người dùng,
đổi lại câu hỏi tiếp theo để là một câu hỏi độc lập.

Lịch sử Trò chuyện:
{{chat_history}}
Đầu vào Tiếp Theo: {{question}}
Câu hỏi độc lập:";

const CONDENSE_CS: &str = "\
Vzhledem k následujícímu rozhovoru mezi uživatelem a AI asistentem a následné otázce od uživatele,
přeformulujte následující otázku tak, aby byla samostatnou otázkou.

Historie chatu:
{{chat_history}}
Následující dotaz: {{question}}
Samostatná otázka:";

/// The assistant persona, sent as the system message of every answer.
pub fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::English => SYSTEM_EN,
        Language::Vietnamese => SYSTEM_VI,
        Language::Czech => SYSTEM_CS,
    }
}

/// Wraps retrieved chunks. Variable: `context_str`.
pub fn context_prompt(language: Language) -> PromptTemplate {
    PromptTemplate::new(match language {
        Language::English => CONTEXT_EN,
        Language::Vietnamese => CONTEXT_VI,
        Language::Czech => CONTEXT_CS,
    })
}

/// Rewrites a follow-up into a standalone question. Variables:
/// `chat_history`, `question`.
pub fn condense_prompt(language: Language) -> PromptTemplate {
    PromptTemplate::new(match language {
        Language::English => CONDENSE_EN,
        Language::Vietnamese => CONDENSE_VI,
        Language::Czech => CONDENSE_CS,
    })
}
