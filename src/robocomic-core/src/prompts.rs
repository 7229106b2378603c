//! Prompt templates.
//!
//! Placeholders use `{name}` syntax and are filled with [`fill`].

use crate::persona::Language;

pub const TOPICAL_WITH_CONTEXT_EN: &str = "IMPORTANT: Your response MUST be under 50 words. \
You are {name}, a {style} comedian. \
Here are some recent or funny moments about the topic '{topic}':\n{context}\n\
Your joke MUST be based almost entirely (at least 90%) on the context above. Reference or use the context as much as possible. \
Perform a short, funny bit about the topic. \
If you exceed 50 words, your response will be ignored. \
REMEMBER: DO NOT EXCEED 50 WORDS.";

pub const TOPICAL_EN: &str = "IMPORTANT: Your response MUST be under 50 words. \
You are {name}, a {style} comedian. \
Perform a short, funny bit about the topic '{topic}'. \
If you exceed 50 words, your response will be ignored. \
REMEMBER: DO NOT EXCEED 50 WORDS.";

pub const ROAST_EN: &str = "IMPORTANT: Your response MUST be under 30 words. \
You are {name}, a {style} comedian. Roast your fellow comedian with a witty, funny insult. \
If you exceed 30 words, your response will be ignored. \
REMEMBER: DO NOT EXCEED 30 WORDS.";

pub const TOPICAL_WITH_CONTEXT_PL: &str = "WAŻNE: Twoja odpowiedź NIE MOŻE przekroczyć 50 słów. \
Jesteś {name}, komikiem o stylu {style}. \
Oto kilka ostatnich lub zabawnych faktów na temat '{topic}':\n{context}\n\
Twój żart MUSI być niemal w całości (co najmniej w 90%) oparty na powyższym kontekście. Odnoś się do niego lub wykorzystuj go jak najwięcej. \
Wykonaj krótki, zabawny występ na ten temat. \
Jeśli przekroczysz 50 słów, twoja odpowiedź zostanie zignorowana. \
PAMIĘTAJ: NIE PRZEKRACZAJ 50 SŁÓW.";

pub const TOPICAL_PL: &str = "WAŻNE: Twoja odpowiedź NIE MOŻE przekroczyć 50 słów. \
Jesteś {name}, komikiem o stylu {style}. \
Wykonaj krótki, zabawny występ na temat '{topic}'. \
Jeśli przekroczysz 50 słów, twoja odpowiedź zostanie zignorowana. \
PAMIĘTAJ: NIE PRZEKRACZAJ 50 SŁÓW.";

pub const ROAST_PL: &str = "WAŻNE: Twoja odpowiedź NIE MOŻE przekroczyć 30 słów. \
Jesteś {name}, komikiem o stylu {style}. Zrób roast drugiego komika dowcipną, zabawną obelgą. \
Jeśli przekroczysz 30 słów, twoja odpowiedź zostanie zignorowana. \
PAMIĘTAJ: NIE PRZEKRACZAJ 30 SŁÓW.";

const TOPIC_CONTEXT_EN: &str = "List exactly 10 best-known, widely recognized, true anecdotes, interesting facts, or funny moments about the topic: '{topic}'. \
Return only the list, with no introductory or closing sentences. Each item should be short and specific. \
Base your answer only on facts, events, and situations that really happened or are widely known. \
Do not invent or make up information. Answer in English.";

const TOPIC_CONTEXT_PL: &str = "Wypisz dokładnie 10 najsłynniejszych, powszechnie znanych, prawdziwych anegdot, ciekawostek lub śmiesznych momentów związanych z tematem: '{topic}'. \
Podaj wyłącznie listę, bez żadnych wstępnych ani końcowych zdań. Każdy punkt powinien być krótki i konkretny. \
Opieraj się wyłącznie na faktach, wydarzeniach i sytuacjach, które naprawdę miały miejsce lub są powszechnie znane. \
Nie wymyślaj informacji. Odpowiedź po polsku.";

const JUDGING_EN: &str = r#"You are an impartial judge at a stand-up comedy duel between {comedian1_name} and {comedian2_name}.

TRANSCRIPT:
{history_text}

Evaluate both comedians against each of these criteria:
- Humor: how funny the material actually is
- Creativity: originality of the jokes and angles
- Consistency: staying true to their own comedic style
- Engagement: how well they play off their opponent
- Delivery: timing, rhythm and punchline construction

RULES:
- The order in which the comedians performed must not influence your decision.
- Refer to the comedians only as {comedian1_name} and {comedian2_name}. Never call them "Comedian 1" or "Comedian 2".
- Pick exactly one winner and explain the decision in a single sentence.

{format_instructions}"#;

const JUDGING_PL: &str = r#"Jesteś bezstronnym jurorem w pojedynku stand-upowym pomiędzy {comedian1_name} a {comedian2_name}.

TRANSKRYPCJA:
{history_text}

Oceń obu komików według każdego z kryteriów:
- Humor: na ile materiał jest naprawdę zabawny
- Kreatywność: oryginalność żartów i pomysłów
- Spójność: wierność własnemu stylowi komediowemu
- Zaangażowanie: jak dobrze odpowiadają na występ przeciwnika
- Wykonanie: wyczucie czasu, rytm i budowa puent

ZASADY:
- Kolejność występów nie może wpływać na twoją decyzję.
- Nazywaj komików wyłącznie {comedian1_name} i {comedian2_name}. Nigdy nie używaj określeń "Komik 1" ani "Komik 2".
- Wybierz dokładnie jednego zwycięzcę i uzasadnij decyzję jednym zdaniem. Uzasadnienie napisz po polsku.

{format_instructions}"#;

const FORMAT_INSTRUCTIONS: &str = r#"The output should be a markdown code snippet formatted in the following schema, including the leading and trailing "```json" and "```":

```json
{
	"winner": string  // {winner_description}
	"summary": string  // {summary_description}
}
```"#;

/// Replace every `{key}` placeholder in `template` in a single pass.
/// Substituted values are never scanned again; unknown braces stay as is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = values.iter().find(|(key, _)| {
            after
                .strip_prefix(key)
                .is_some_and(|tail| tail.starts_with('}'))
        });
        match placeholder {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn topic_context_prompt(topic: &str, lang: Language) -> String {
    let template = match lang {
        Language::En => TOPIC_CONTEXT_EN,
        Language::Pl => TOPIC_CONTEXT_PL,
    };
    fill(template, &[("topic", topic)])
}

pub fn judging_prompt(
    comedian1_name: &str,
    comedian2_name: &str,
    history_text: &str,
    lang: Language,
) -> String {
    let (template, winner_description, summary_description) = match lang {
        Language::En => (
            JUDGING_EN,
            format!("The name of the winning comedian: exactly {comedian1_name} or {comedian2_name}"),
            "One sentence explaining why the winner won".to_string(),
        ),
        Language::Pl => (
            JUDGING_PL,
            format!("Imię zwycięskiego komika: dokładnie {comedian1_name} albo {comedian2_name}"),
            "Jedno zdanie wyjaśniające, dlaczego zwycięzca wygrał".to_string(),
        ),
    };
    let format_instructions = fill(
        FORMAT_INSTRUCTIONS,
        &[
            ("winner_description", &winner_description),
            ("summary_description", &summary_description),
        ],
    );

    fill(
        template,
        &[
            ("comedian1_name", comedian1_name),
            ("comedian2_name", comedian2_name),
            ("format_instructions", &format_instructions),
            ("history_text", history_text),
        ],
    )
}

/// Lines of the transcript returned when a duel cannot be completed.
pub fn fallback_lines(lang: Language) -> [&'static str; 3] {
    match lang {
        Language::En => [
            "The comedians are experiencing technical difficulties. Please try again in a moment.",
            "Sorry folks, my punchlines got stuck in traffic. Give me a minute!",
            "And I was just about to deliver the joke of the century. Technical difficulties, everyone!",
        ],
        Language::Pl => [
            "Komicy mają problemy techniczne. Spróbuj ponownie za chwilę.",
            "Przepraszam państwa, moje puenty utknęły w korku. Dajcie mi chwilę!",
            "A miałem właśnie opowiedzieć żart stulecia. Problemy techniczne, kochani!",
        ],
    }
}

pub fn default_topic(lang: Language) -> &'static str {
    match lang {
        Language::En => "anything",
        Language::Pl => "cokolwiek",
    }
}

pub fn default_verdict_summary(winner: &str, lang: Language) -> String {
    match lang {
        Language::En => format!("{winner} wins by default (judging failed)."),
        Language::Pl => format!("{winner} wygrywa walkowerem (ocena nie powiodła się)."),
    }
}
