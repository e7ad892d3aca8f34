//! Numbered menus.
//!
//! Each menu is a closed enum whose options are listed in a static table;
//! the operator's number indexes that table. Anything else is reported as
//! [`UnrecognizedCommand`] and the menu is shown again.

use std::fmt::Write as _;

use thiserror::Error;

/// Input that matches no menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid option, please choose again")]
pub struct UnrecognizedCommand(pub String);

/// A closed set of menu options.
pub trait Menu: Copy + PartialEq + 'static {
    /// Heading printed above the options.
    const TITLE: &'static str;

    /// Options in display order; option `n` is `ENTRIES[n - 1]`.
    const ENTRIES: &'static [(Self, &'static str)];

    /// The option that leaves the menu.
    const QUIT: Self;

    /// Maps the operator's input to an option.
    ///
    /// # Errors
    ///
    /// Returns [`UnrecognizedCommand`] for anything but a listed number.
    fn parse(input: &str) -> Result<Self, UnrecognizedCommand> {
        let input = input.trim();
        input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| Self::ENTRIES.get(i))
            .map(|(choice, _)| *choice)
            .ok_or_else(|| UnrecognizedCommand(input.to_owned()))
    }

    /// Renders the menu for `host`.
    #[must_use]
    fn render(host: &str) -> String {
        let mut text = format!("\n{} ({host})\n", Self::TITLE);
        for (n, (_, label)) in Self::ENTRIES.iter().enumerate() {
            let _ = writeln!(text, "  [{}] {label}", n + 1);
        }
        text.push_str("Choose an option: ");
        text
    }
}

/// Snapshot lock menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnaplockChoice {
    /// List all snapshots.
    ListSnapshots,
    /// Lock a snapshot.
    LockSnapshot,
    /// List the locks on a snapshot.
    ListLocks,
    /// Delete one lock.
    DeleteLock,
    /// Delete every lock on a snapshot.
    DeleteAllLocks,
    /// Leave the menu.
    Quit,
}

impl Menu for SnaplockChoice {
    const TITLE: &'static str = "Snaplock";
    const ENTRIES: &'static [(Self, &'static str)] = &[
        (Self::ListSnapshots, "List all snapshots"),
        (Self::LockSnapshot, "Lock a snapshot"),
        (Self::ListLocks, "List locks for a snapshot"),
        (Self::DeleteLock, "Delete a snapshot lock"),
        (Self::DeleteAllLocks, "Delete all locks from a snapshot"),
        (Self::Quit, "Quit"),
    ];
    const QUIT: Self = Self::Quit;
}

/// Changelist menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangelistChoice {
    /// List all snapshots.
    ListSnapshots,
    /// Run a changelist job between two snapshots.
    CreateChangelist,
    /// List changelists.
    ListChangelists,
    /// Show one changelist's entries.
    ShowChangelist,
    /// Delete a changelist.
    DeleteChangelist,
    /// Leave the menu.
    Quit,
}

impl Menu for ChangelistChoice {
    const TITLE: &'static str = "Changelist";
    const ENTRIES: &'static [(Self, &'static str)] = &[
        (Self::ListSnapshots, "List all snapshots"),
        (Self::CreateChangelist, "Create a changelist"),
        (Self::ListChangelists, "List changelists"),
        (Self::ShowChangelist, "Display a changelist"),
        (Self::DeleteChangelist, "Delete a changelist"),
        (Self::Quit, "Quit"),
    ];
    const QUIT: Self = Self::Quit;
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("1", SnaplockChoice::ListSnapshots)]
    #[test_case(" 2 ", SnaplockChoice::LockSnapshot)]
    #[test_case("5", SnaplockChoice::DeleteAllLocks)]
    #[test_case("6", SnaplockChoice::Quit)]
    fn snaplock_numbers_map_to_choices(input: &str, expected: SnaplockChoice) {
        assert_eq!(SnaplockChoice::parse(input), Ok(expected));
    }

    #[test_case("0")]
    #[test_case("7")]
    #[test_case("")]
    #[test_case("quit")]
    #[test_case("-1")]
    fn unknown_input_is_unrecognized(input: &str) {
        assert_eq!(
            ChangelistChoice::parse(input),
            Err(UnrecognizedCommand(input.trim().to_owned()))
        );
    }

    #[test]
    fn render_lists_every_entry() {
        let text = ChangelistChoice::render("10.0.0.5");
        assert!(text.contains("Changelist (10.0.0.5)"));
        assert!(text.contains("[1] List all snapshots"));
        assert!(text.contains("[6] Quit"));
        assert!(text.ends_with("Choose an option: "));
    }

    #[test]
    fn quit_is_listed() {
        assert!(SnaplockChoice::ENTRIES.iter().any(|(c, _)| *c == SnaplockChoice::QUIT));
        assert!(ChangelistChoice::ENTRIES.iter().any(|(c, _)| *c == ChangelistChoice::QUIT));
    }
}
