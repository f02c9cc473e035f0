// src/services/render.rs

use crate::{
    models::{
        event::{OptionView, QuestionView, RenderInstruction, ResultView},
        quiz::QuizContent,
    },
    utils::text::{italicize_quotes, option_description, sanitize_prompt, truncate_chars},
};

// Select menus accept at most this many options.
const MAX_RENDERED_OPTIONS: usize = 25;

/// Builds the render instruction for question `index`.
///
/// Returns `None` when the index is out of range or nothing renderable is left.
pub fn render_question(
    content: &QuizContent,
    quiz_title: &str,
    index: usize,
) -> Option<RenderInstruction> {
    let question = content.definition.question(index)?;

    let options: Vec<OptionView> = question
        .options
        .iter()
        .filter(|o| !o.key.trim().is_empty() && !o.label.trim().is_empty())
        .take(MAX_RENDERED_OPTIONS)
        .map(|o| {
            let key = o.key.trim().to_ascii_uppercase();
            OptionView {
                label: truncate_chars(&format!("{})", key), 100),
                value: key,
                description: option_description(&o.label),
            }
        })
        .collect();

    if options.is_empty() {
        return None;
    }

    Some(RenderInstruction::Question(QuestionView {
        question_index: index,
        custom_id: format!("quiz:q:{}", index),
        title: format!("{} - Question {}", quiz_title, index + 1),
        prompt: sanitize_prompt(&question.prompt),
        options,
        image_url: content.image_for_question(index).map(str::to_string),
    }))
}

/// Builds the final result card for the winning category.
pub fn render_result(content: &QuizContent, top_category_id: Option<&str>) -> RenderInstruction {
    let name = top_category_id
        .and_then(|id| content.category(id))
        .map(|c| c.name.clone());

    let rich = top_category_id.and_then(|id| content.results.get(id));

    let view = match rich {
        Some(result) => {
            let mut body = italicize_quotes(result.body.as_deref().unwrap_or_default());
            if let Some(teaser) = result.teaser.as_deref().filter(|t| !t.is_empty()) {
                body = format!("{}\n\nTeaser: {}", body, teaser);
            }
            let description = match result.subtitle.as_deref().filter(|s| !s.is_empty()) {
                Some(subtitle) => format!("_{}_\n\n{}", subtitle, body),
                None => body,
            };
            ResultView {
                category_id: top_category_id.map(str::to_string),
                title: result
                    .heading
                    .clone()
                    .or(name)
                    .unwrap_or_else(|| "Result".to_string()),
                description,
                image: result.image.clone(),
            }
        }
        None => ResultView {
            category_id: top_category_id.map(str::to_string),
            title: format!("You matched: {}", name.as_deref().unwrap_or("Unknown")),
            description: "Thanks for completing the quiz.".to_string(),
            image: None,
        },
    };

    RenderInstruction::FinalResult(view)
}
