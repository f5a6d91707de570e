use anyhow::Result;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::capture::TaskInput;
use crate::dates::parse_date_spec;
use crate::error::ValidationError;
use crate::household::{Household, Session};
use crate::model::NewTask;

/// Result of inline token parsing from the capture text.
#[derive(Debug, Default)]
struct InlineTokens {
    title_words: Vec<String>,
    due: Option<NaiveDate>,
    apartment: Option<String>,
    owner: Option<String>,
    important: bool,
}

/// Turn capture input into a task for `session`, validated against the roster.
///
/// Explicit fields win over inline tokens. Members can only add tasks for
/// themselves; admins may assign any roster member with `@name`.
pub fn prepare_new_task(
    input: &TaskInput,
    household: &Household,
    session: &Session,
    today: NaiveDate,
) -> Result<NewTask> {
    input.require_text()?;
    let raw_text = input.text.join(" ");
    let inline = parse_inline_tokens(&raw_text, today)?;

    let text = inline.title_words.join(" ").trim().to_string();
    if text.is_empty() {
        return Err(ValidationError::EmptyText.into());
    }

    let due = match &input.due {
        Some(spec) => Some(parse_date_spec(spec, today)?),
        None => inline.due,
    };

    let apartment = match input.apartment.as_deref().or(inline.apartment.as_deref()) {
        Some(tag) => Some(resolve_apartment(household, tag)?),
        None => None,
    };

    let owner = input
        .owner
        .as_deref()
        .or(inline.owner.as_deref())
        .map(str::trim)
        .unwrap_or(session.name.as_str())
        .to_string();
    if household.member(&owner).is_none() {
        return Err(ValidationError::UnknownMember(owner).into());
    }
    if !session.can_manage(&owner) {
        return Err(ValidationError::NotPermitted {
            actor: session.name.clone(),
            owner,
        }
        .into());
    }

    let note = input
        .note
        .as_ref()
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty());

    Ok(NewTask {
        text,
        owner,
        created: Some(today),
        important: input.important || inline.important,
        due,
        note,
        apartment,
        subtasks: Vec::new(),
    })
}

fn resolve_apartment(household: &Household, tag: &str) -> Result<String> {
    let spaced = tag.replace(&['-', '_'][..], " ");
    household
        .resolve_apartment(tag)
        .or_else(|| household.resolve_apartment(&spaced))
        .map(str::to_string)
        .ok_or_else(|| ValidationError::UnknownApartment(tag.to_string()).into())
}

fn parse_inline_tokens(text: &str, today: NaiveDate) -> Result<InlineTokens> {
    let mut result = InlineTokens::default();

    for raw_piece in text.split_whitespace() {
        let (piece, trailing) = strip_trailing_punctuation(raw_piece);
        if raw_piece == "!" || raw_piece == "!!" {
            result.important = true;
            continue;
        }
        if piece.starts_with('@') && piece.len() > 1 {
            result.owner = Some(piece.trim_start_matches('@').to_ascii_lowercase());
            if let Some(rest) = trailing {
                push_trailing(&mut result.title_words, rest);
            }
            continue;
        }
        if let Some(spec) = piece.strip_prefix("due:") {
            result.due = Some(parse_date_spec(spec, today)?);
            if let Some(rest) = trailing {
                push_trailing(&mut result.title_words, rest);
            }
            continue;
        }
        if let Some(spec) = piece.strip_prefix("apt:") {
            if !spec.is_empty() {
                result.apartment = Some(spec.to_string());
            }
            if let Some(rest) = trailing {
                push_trailing(&mut result.title_words, rest);
            }
            continue;
        }

        result.title_words.push(raw_piece.to_string());
    }

    Ok(result)
}

fn strip_trailing_punctuation(input: &str) -> (String, Option<String>) {
    static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[[:punct:]]+$").expect("valid regex"));
    if let Some(mat) = PUNCT_RE.find(input) {
        let token = input[..mat.start()].to_string();
        let trailing = input[mat.start()..].to_string();
        (token, Some(trailing))
    } else {
        (input.to_string(), None)
    }
}

fn push_trailing(words: &mut Vec<String>, trailing: String) {
    if let Some(last) = words.last_mut() {
        last.push_str(&trailing);
    } else {
        words.push(trailing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_validation;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn session(email: &str) -> Session {
        Household::default()
            .session_for_email("uid", email)
            .expect("roster member")
    }

    fn words(text: &str) -> TaskInput {
        TaskInput::from_text(text)
    }

    #[test]
    fn parses_inline_tokens() {
        let task = prepare_new_task(
            &words("Fix leaking tap due:+2d apt:attic !"),
            &Household::default(),
            &session("ana@household.local"),
            today(),
        )
        .unwrap();

        assert_eq!(task.text, "Fix leaking tap");
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2024, 1, 12));
        assert_eq!(task.apartment.as_deref(), Some("Attic"));
        assert_eq!(task.owner, "ana");
        assert_eq!(task.created, Some(today()));
        assert!(task.important);
    }

    #[test]
    fn multi_word_apartments_accept_dashes() {
        let task = prepare_new_task(
            &words("Sweep patio apt:garden-flat"),
            &Household::default(),
            &session("ana@household.local"),
            today(),
        )
        .unwrap();
        assert_eq!(task.apartment.as_deref(), Some("Garden Flat"));
    }

    #[test]
    fn explicit_fields_override_tokens() {
        let mut input = words("Check smoke alarm due:tomorrow");
        input.due = Some("2024-02-01".into());
        input.apartment = Some("First Floor".into());
        input.note = Some("  battery in drawer ".into());
        let task = prepare_new_task(
            &input,
            &Household::default(),
            &session("luca@household.local"),
            today(),
        )
        .unwrap();
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(task.apartment.as_deref(), Some("First Floor"));
        assert_eq!(task.note.as_deref(), Some("battery in drawer"));
    }

    #[test]
    fn admin_can_assign_members() {
        let task = prepare_new_task(
            &words("Clean stairwell @mia"),
            &Household::default(),
            &session("admin@household.local"),
            today(),
        )
        .unwrap();
        assert_eq!(task.owner, "mia");
    }

    #[test]
    fn members_cannot_assign_others() {
        let err = prepare_new_task(
            &words("Clean stairwell @mia"),
            &Household::default(),
            &session("ana@household.local"),
            today(),
        )
        .unwrap_err();
        assert!(is_validation(&err));
    }

    #[test]
    fn rejects_empty_and_unknown_values() {
        let household = Household::default();
        let ana = session("ana@household.local");

        let empty = prepare_new_task(&words("due:today !"), &household, &ana, today()).unwrap_err();
        assert_eq!(
            empty.downcast_ref::<ValidationError>(),
            Some(&ValidationError::EmptyText)
        );

        let unknown = prepare_new_task(&words("Paint apt:cellar"), &household, &ana, today())
            .unwrap_err();
        assert_eq!(
            unknown.downcast_ref::<ValidationError>(),
            Some(&ValidationError::UnknownApartment("cellar".into()))
        );
    }

    #[test]
    fn keeps_trailing_punctuation_on_title() {
        let task = prepare_new_task(
            &words("Call plumber due:fri."),
            &Household::default(),
            &session("ana@household.local"),
            today(),
        )
        .unwrap();
        assert_eq!(task.text, "Call plumber.");
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2024, 1, 12));
    }
}
