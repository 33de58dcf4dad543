//! Prompt templates for the OpenAI-backed generation service.
//!
//! Placeholders use `{{name}}` and are filled by [`render`].

/// Newsroom persona used as the system message for body generation.
pub const WHISKER_SYSTEM: &str = "You are Whisker Walters, senior correspondent for the Rat News \
Network, the most trusted name in rodent journalism. You write deadpan satirical news for an \
audience of rats. Treat every absurd premise with complete journalistic seriousness.";

pub const IDEA_GENERATOR: &str = "Brainstorm {{n}} article ideas for the Rat News Network, a \
satirical news outlet written by rats, for rats. Each idea needs a punchy headline-style title, a \
one-sentence description of the premise and a news category such as Politics, Economy, Science, \
Culture, Sports or Local. Respond with a JSON object of the form \
{\"ideas\": [{\"title\": \"...\", \"description\": \"...\", \"category\": \"...\"}]} containing \
exactly {{n}} ideas.";

pub const OUTLINE: &str = "Write a brief outline for a Rat News Network article based on the \
following idea. List the angle, three to five key beats and the closing joke. Keep it under 200 \
words.\n\n{{idea}}";

/// Body prompt variants; the chosen key is recorded on the article.
pub const ARTICLE_GENERATORS: &[(&str, &str)] = &[
    (
        "article_gen_classic",
        "Write a Rat News Network article of about {{num_words}} words.\n\n{{idea}}\n\nOutline:\n\
{{outline}}\n\nStart with a headline on its own line, then a one-sentence overview, then the \
article body in short newspaper paragraphs. Quote at least one rat expert.",
    ),
    (
        "article_gen_feature",
        "Write a long-form Rat News Network feature of roughly {{num_words}} words.\n\n{{idea}}\n\n\
Outline:\n{{outline}}\n\nBegin with a headline line and a one-sentence standfirst. Use vivid \
sewer-level detail, interviews with at least two rats and a dry closing line.",
    ),
    (
        "article_gen_breaking",
        "Breaking news desk. Produce a Rat News Network report of about {{num_words}} words.\n\n\
{{idea}}\n\nOutline:\n{{outline}}\n\nOpen with an all-business headline, follow with a single \
sentence summary and then the developing story, including official statements and eyewitness \
squeaks.",
    ),
];

pub const ARTICLE_TO_JSON_SYSTEM: &str = "You convert news articles into JSON. Never rewrite the \
text; copy it verbatim into the right field.";

pub const ARTICLE_TO_JSON: &str = "Split the following article into a JSON object with the keys \
\"title\" (the headline), \"overview\" (one-sentence summary) and \"body\" (the remaining text, \
markdown allowed).\n\n{{article}}";

pub const IMAGE_BRAINSTORM: &str = "We need a cover image for the Rat News Network article \
\"{{title}}\". Here is its outline:\n\n{{overview}}\n\nBrainstorm three distinct photo-realistic \
image concepts featuring rats that would work as the article's cover photo.";

pub const IMAGE_SELECT: &str = "Pick the strongest concept and describe it as JSON: \
{\"image_idea\": \"one detailed paragraph describing the scene\"}.";

pub const IMAGE_CREATE: &str = "A photo-realistic news photograph for the article \"{{title}}\". \
{{image_idea}} No text or captions in the image.";

pub const COMMENTS: &str = "Write {{num_comments}} reader comments for the following Rat News \
Network article, as if left by rats in the comment section. Vary the tone: enthusiastic, \
skeptical, off-topic, pedantic. Respond with a JSON object \
{\"comments\": [{\"author\": \"username\", \"text\": \"comment\"}]}.\n\n# {{title}}\n\n{{body}}";

pub const CLEAN_ARTICLE: &str = "You are given the markdown export of a news web page. Extract \
the article it contains and respond with a JSON object {\"title\": \"...\", \"body\": \"...\", \
\"author\": \"...\"}. Leave out navigation, ads, captions and related links. Use an empty string \
for any field you cannot find.";

pub const PARODY_SYSTEM: &str = "You adapt human news into Rat News Network stories. Keep the \
structure and stakes of the original story but retell it entirely from the perspective of rats.";

pub const PARODY_PREMISE: &str = "Here is a news article titled \"{{title}}\":\n\n{{article}}\n\n\
Write a short description of a rat-world version of this story: who the rats are, what happened \
to them and the satirical angle. Two to four sentences.";

/// Replace every `{{key}}` in `template` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_all_occurrences() {
        let prompt = render(IDEA_GENERATOR, &[("n", "4")]);
        assert!(!prompt.contains("{{n}}"));
        assert_eq!(prompt.matches('4').count(), 2);
    }

    #[test]
    fn test_generator_variants_use_known_placeholders() {
        for (name, template) in ARTICLE_GENERATORS {
            assert!(name.starts_with("article_gen"));
            let filled = render(
                template,
                &[("idea", "i"), ("outline", "o"), ("num_words", "300")],
            );
            assert!(!filled.contains("{{"), "{name} left a placeholder");
        }
    }
}
