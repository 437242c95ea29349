use crate::error::ExpansionError;

pub const USER_QUERY_MARKER: &str = "{user_query}";
pub const INSTRUCTIONS_MARKER: &str = "{instructions}";

pub const HUMAN_TURN: &str = "\n\nHuman:";
pub const ASSISTANT_TURN: &str = "\n\nAssistant:";

pub const STOP_SEQUENCES: [&str; 1] = [HUMAN_TURN];

pub const CONVERSATION_TEMPLATE: &str = "\n\nHuman: {instructions}\n\nAssistant:";

pub const INSTRUCTION_TEMPLATE: &str = r#"
<role>
1. You are an expert at expanding a medical/clinical user's search query into complete sentences and offering alternative versions of the query.
</role>

<user_personas>
1. Clinical Staff
2. Medical Doctors
3. Doctors doing Continuing Education
4. Researchers
</user_personas>

<task_instructions>
1. Take a deep breath and focus on medical and clinical information.
2.0 You will extract keywords and phrases from the user's query to help you complete your tasks.
2.1 You will consider if the user is using acronyms or medical shorthand/jargon and convert those to their full meaning.
3 You will expand the user's query, located in the <user_query></user_query> xml tags, into complete sentences and generate alternative versions of those queries.
5. You will wrap each alternate query into <alternate_query></alternate_query> xml tags.
6. You MUST explain your thought process, wrap it into <thought_process></thought_process> xml tags.
7. You MUST format your answer based on the XML style format provided in the <answer_format></answer_format> xml tags.
</task_instructions>

<user_query>
{user_query}
</user_query>

<task_guidance>
1. The user's query is located in the <user_query></user_query> xml tags.
2. The types and roles of your users are within the <user_personas></user_personas> xml tags above.
2. You MUST ONLY give the original user query, your alternate versions of the original query, and your thought process, NOTHING ELSE.
3. You MUST BE HONEST if you don't know the answer.
4. You MUST NOT hallucinate.
5. You MUST NOT include the prompt you were given.
6. You MUST ONLY give your categorization and thought process, NOTHING ELSE.
</task_guidance>

<answer_format>
<response>
<query>replace with the user's original query here</query>
<alternate_queries>replace with your alternate query here</alternate_queries>
<thought_process>replace with your thought process here</thought_process>
</response>
</answer_format>
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: INSTRUCTION_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, ExpansionError> {
        let text = text.into();
        let markers = text.matches(USER_QUERY_MARKER).count();
        if markers != 1 {
            return Err(ExpansionError::InvalidTemplate(format!(
                "expected exactly one {USER_QUERY_MARKER} marker, found {markers}"
            )));
        }
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    // The query is inserted as-is and never scanned for markers itself.
    pub fn build_instructions(&self, query: &str) -> String {
        substitute_once(&self.text, USER_QUERY_MARKER, query)
    }

    pub fn build_prompt(&self, query: &str) -> String {
        wrap_conversation(&self.build_instructions(query))
    }
}

pub fn build_instructions(query: &str) -> String {
    substitute_once(INSTRUCTION_TEMPLATE, USER_QUERY_MARKER, query)
}

pub fn wrap_conversation(instructions: &str) -> String {
    substitute_once(CONVERSATION_TEMPLATE, INSTRUCTIONS_MARKER, instructions)
}

pub fn build_prompt(query: &str) -> String {
    wrap_conversation(&build_instructions(query))
}

fn substitute_once(template: &str, marker: &str, value: &str) -> String {
    match template.split_once(marker) {
        Some((head, tail)) => {
            let mut rendered = String::with_capacity(template.len() + value.len());
            rendered.push_str(head);
            rendered.push_str(value);
            rendered.push_str(tail);
            rendered
        }
        None => template.to_string(),
    }
}
