//! Interactive choices over [`IoStreams`].
//!
//! Choices are presented sorted case-insensitively and answered with a
//! 1-based number. Invalid answers re-prompt; end of input is an error.

use crate::io::IoStreams;
use crate::types::WaldoError;
use std::io::Write;

/// Asks the user to pick one of `items`, described as `what`.
///
/// An empty list fails with [`WaldoError::EmptySet`]; a single item is
/// returned without prompting.
pub fn choose<T, F>(io: &mut IoStreams, items: &[T], what: &str, label: F) -> Result<T, WaldoError>
where
    T: Clone,
    F: Fn(&T) -> String,
{
    let mut labelled: Vec<(String, &T)> = items.iter().map(|item| (label(item), item)).collect();
    labelled.sort_by_cached_key(|(text, _)| text.to_lowercase());

    match labelled.as_slice() {
        [] => return Err(WaldoError::EmptySet(what.to_string())),
        [(text, item)] => {
            writeln!(io.out, "Using {what}: {text}")?;
            return Ok((*item).clone());
        }
        _ => {}
    }

    writeln!(io.out, "Choose the {what}:")?;
    for (index, (text, _)) in labelled.iter().enumerate() {
        writeln!(io.out, "  {}) {}", index + 1, text)?;
    }

    loop {
        write!(io.out, "Enter a number (1-{}): ", labelled.len())?;
        io.out.flush()?;
        let Some(answer) = io.read_line()? else {
            writeln!(io.out)?;
            return Err(WaldoError::Ambiguous(what.to_string()));
        };
        match answer.trim().parse::<usize>() {
            Ok(choice) if (1..=labelled.len()).contains(&choice) => {
                return Ok(labelled[choice - 1].1.clone());
            }
            _ => writeln!(io.out, "Invalid choice '{}'.", answer.trim())?,
        }
    }
}

/// [`choose`] over plain strings.
pub fn choose_string(io: &mut IoStreams, items: &[String], what: &str) -> Result<String, WaldoError> {
    choose(io, items, what, String::clone)
}

/// Like [`choose_string`], but an empty list yields `None`.
pub fn choose_optional(
    io: &mut IoStreams,
    items: &[String],
    what: &str,
) -> Result<Option<String>, WaldoError> {
    if items.is_empty() {
        return Ok(None);
    }
    choose_string(io, items, what).map(Some)
}

/// Asks a Yes/No question until answered. End of input cancels.
pub fn read_yes_no(io: &mut IoStreams, question: &str) -> Result<bool, WaldoError> {
    loop {
        write!(io.out, "{question} [y/n]: ")?;
        io.out.flush()?;
        let Some(answer) = io.read_line()? else {
            writeln!(io.out)?;
            return Err(WaldoError::Cancelled);
        };
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(io.out, "Please answer 'y' or 'n'.")?,
        }
    }
}
