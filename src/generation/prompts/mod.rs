
use std::fmt;
use std::str::FromStr;

use crate::PressError;

/// Characters of a draft shown to the title prompt
pub const TITLE_PREVIEW_CHARS: usize = 500;

/// Newsletter piece shape requested from the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    #[default]
    Blurb,
    Story,
    Dialogue,
    Matching,
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 4] = [
        ContentFormat::Blurb,
        ContentFormat::Story,
        ContentFormat::Dialogue,
        ContentFormat::Matching,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::Blurb => "blurb",
            ContentFormat::Story => "story",
            ContentFormat::Dialogue => "dialogue",
            ContentFormat::Matching => "matching",
        }
    }

    /// Lenient parse: unknown names fall back to [`ContentFormat::Blurb`]
    #[inline]
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    fn instructions(self) -> &'static str {
        match self {
            ContentFormat::Blurb => BLURB_INSTRUCTIONS,
            ContentFormat::Story => STORY_INSTRUCTIONS,
            ContentFormat::Dialogue => DIALOGUE_INSTRUCTIONS,
            ContentFormat::Matching => MATCHING_INSTRUCTIONS,
        }
    }
}

impl FromStr for ContentFormat {
    type Err = PressError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        ContentFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == name)
            .ok_or_else(|| {
                PressError::Validation(format!(
                    "unknown content format '{s}' (expected blurb, story, dialogue or matching)"
                ))
            })
    }
}

impl fmt::Display for ContentFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[inline]
pub fn build_system_prompt(language: &str, exam: &str, level: &str) -> String {
    format!(
        "You are an expert language learning content creator specialising in {language} for {level} {exam} exam learners.

Your content must:
- Be pedagogically appropriate for {level} proficiency
- Naturally incorporate the provided grammar structures and vocabulary
- Be engaging, culturally authentic, and exam-focused
- Use correct {language} with clear English explanations where needed

Always write in the requested format. Do not deviate from the format instructions."
    )
}

/// User prompt built around the retrieved curriculum items
///
/// Grammar items are tagged `[G1]..` and vocabulary `[V1]..` so the model
/// can cite them. An empty list still produces its section, with a
/// placeholder asking for level-appropriate material instead.
#[inline]
pub fn build_content_prompt(
    format: ContentFormat,
    theme: &str,
    language: &str,
    level: &str,
    grammar: &[String],
    vocabulary: &[String],
) -> String {
    let (grammar_header, grammar_text) = if grammar.is_empty() {
        (
            "RETRIEVED GRAMMAR STRUCTURES (0 items):".to_string(),
            "(No grammar data retrieved. Use appropriate structures for this level.)".to_string(),
        )
    } else {
        (
            format!(
                "RETRIEVED GRAMMAR STRUCTURES ({} items). Use EACH ONE at least once:",
                grammar.len()
            ),
            tagged("G", grammar, "\n\n"),
        )
    };

    let (vocab_header, vocab_text) = if vocabulary.is_empty() {
        (
            "RETRIEVED VOCABULARY (0 items):".to_string(),
            "(No vocabulary data retrieved. Use appropriate words for this level.)".to_string(),
        )
    } else {
        (
            format!(
                "RETRIEVED VOCABULARY ({} items). Use EACH ONE at least once:",
                vocabulary.len()
            ),
            tagged("V", vocabulary, "\n"),
        )
    };

    format!(
        "{grammar_header}
{grammar_text}

{vocab_header}
{vocab_text}

TASK: Write a {format} for {language} {level} learners on the theme: \"{theme}\"

These are real curriculum items from a {level} database. Build the content AROUND them.
Do not substitute them with other grammar or vocabulary.
In the closing \"Grammar & Vocabulary\" section, reference each item by its [G#] / [V#] tag.

{instructions}",
        instructions = format.instructions()
    )
}

/// Prompt asking for a short post title, given the start of a draft
#[inline]
pub fn build_title_prompt(content: &str, language: &str, level: &str) -> String {
    let preview: String = content.chars().take(TITLE_PREVIEW_CHARS).collect();
    format!(
        "Generate a compelling, concise newsletter post title (max 70 chars) \
         for this {language} {level} language learning content. \
         Return only the title, no quotes or explanation.\n\n\
         Content preview:\n{preview}"
    )
}

fn tagged(prefix: &str, items: &[String], separator: &str) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("[{prefix}{}] {item}", i + 1))
        .collect::<Vec<_>>()
        .join(separator)
}

const BLURB_INSTRUCTIONS: &str = "FORMAT REQUIREMENTS:
- 150-200 words in the target language
- Keep language natural and conversational
- End with this section in English:

## Grammar & Vocabulary

### Grammar Used
For each grammar structure used, provide:
- **Pattern**: the structure or pattern name
- **Example**: the sentence from your blurb that uses it (target language + English translation)
- **Note**: one sentence explaining when/how to use it

### Vocabulary Used
A markdown table of every notable word or phrase from your blurb:
| Word / Phrase | Reading | English | Usage note |
|---|---|---|---|";

const STORY_INSTRUCTIONS: &str = "FORMAT REQUIREMENTS:
- 400-600 words of narrative in the target language
- Include a title on its own line before the story
- Use vivid, culturally authentic details
- End with this section in English:

## Grammar & Vocabulary

### Grammar Used
For each grammar structure used in the story, provide:
- **Pattern**: the structure or pattern name
- **Example**: copy the sentence from your story that uses it (target language + English translation)
- **Note**: one sentence explaining when/how to use it

### Vocabulary Used
A markdown table of every notable word or phrase from your story:
| Word / Phrase | Reading | English | Example sentence from story |
|---|---|---|---|";

const DIALOGUE_INSTRUCTIONS: &str = "FORMAT REQUIREMENTS:
- 10-16 exchanges between 2 speakers (label as Speaker A / Speaker B)
- Set the scene in one sentence before the dialogue
- Make the conversation natural and idiomatic
- End with these two sections in English:

## Key Phrases
For each important phrase from the dialogue:
- **Phrase** (target language): literal English translation, usage note

## Grammar & Vocabulary

### Grammar Used
For each grammar structure used in the dialogue, provide:
- **Pattern**: the structure or pattern name
- **Example**: copy the line from your dialogue that uses it (target language + English translation)
- **Note**: one sentence explaining when/how to use it

### Vocabulary Used
A markdown table of every notable word or phrase from your dialogue:
| Word / Phrase | Reading | English | Used in line |
|---|---|---|---|";

const MATCHING_INSTRUCTIONS: &str = "FORMAT REQUIREMENTS:
- Create a 10-item matching table with two columns:
  | Target Language Sentence | English Meaning |
  |---|---|
- Use the grammar structures and vocabulary naturally in each sentence
- After the table, include:

## Answer Key
[Numbered list confirming the correct matches]

## Grammar & Vocabulary

### Grammar Used
For each grammar structure used in the sentences, provide:
- **Pattern**: the structure or pattern name
- **Example**: the sentence from the table that uses it (target language + English translation)
- **Note**: one sentence explaining when/how to use it

### Vocabulary Used
A markdown table of every notable word or phrase from the sentences:
| Word / Phrase | Reading | English | Usage note |
|---|---|---|---|";
