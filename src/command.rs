//! Command tables
//!
//! An ordered list of `(name, signature, description, handler)` entries.
//! Built-ins live in one table; every command-contributing plugin owns its
//! own. Names are unique within a table only.

use std::fmt::Write as _;

use crate::codec::Signature;
use crate::error::TableError;

/// A unit of dispatchable behavior.
#[derive(Debug, Clone)]
pub struct Command<H> {
    name: String,
    signature: Signature,
    description: String,
    handler: H,
}

impl<H> Command<H> {
    /// Build a command, validating the name and signature.
    ///
    /// # Errors
    /// [`TableError::InvalidName`] for an empty name or one containing
    /// whitespace, [`TableError::Signature`] for an unknown argument kind.
    pub fn new(
        name: impl Into<String>,
        signature: &str,
        description: impl Into<String>,
        handler: H,
    ) -> Result<Self, TableError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(TableError::InvalidName(name));
        }

        Ok(Self {
            name,
            signature: Signature::parse(signature)?,
            description: description.into(),
            handler,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// One `help` listing line, `\r\n` terminated.
    #[must_use]
    pub fn help_line(&self) -> String {
        format!(
            "{:<10} - [{:<5}]: {}\r\n",
            self.name, self.signature, self.description
        )
    }
}

/// Ordered command collection. Lookup order is insertion order.
#[derive(Debug, Clone)]
pub struct CommandTable<H> {
    commands: Vec<Command<H>>,
}

impl<H> CommandTable<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Append a command.
    ///
    /// # Errors
    /// [`TableError::DuplicateName`] if the name is already in this table.
    pub fn push(&mut self, command: Command<H>) -> Result<(), TableError> {
        if self.find_exact(command.name()).is_some() {
            return Err(TableError::DuplicateName(command.name));
        }
        self.commands.push(command);
        Ok(())
    }

    /// Case-sensitive exact name match.
    #[must_use]
    pub fn find_exact(&self, name: &str) -> Option<&Command<H>> {
        self.commands.iter().find(|cmd| cmd.name == name)
    }

    /// First command (in insertion order) whose name starts with `token`.
    #[must_use]
    pub fn find_prefix(&self, token: &str) -> Option<&Command<H>> {
        if token.is_empty() {
            return None;
        }
        self.commands.iter().find(|cmd| cmd.name.starts_with(token))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command<H>> {
        self.commands.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The whole table in `help` format.
    #[must_use]
    pub fn help_text(&self) -> String {
        self.commands.iter().fold(String::new(), |mut out, cmd| {
            let _ = write!(out, "{}", cmd.help_line());
            out
        })
    }
}

impl<H> Default for CommandTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> TryFrom<Vec<Command<H>>> for CommandTable<H> {
    type Error = TableError;

    fn try_from(commands: Vec<Command<H>>) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for command in commands {
            table.push(command)?;
        }
        Ok(table)
    }
}

impl<'a, H> IntoIterator for &'a CommandTable<H> {
    type Item = &'a Command<H>;
    type IntoIter = std::slice::Iter<'a, Command<H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(names: &[&str]) -> CommandTable<usize> {
        let commands = names
            .iter()
            .enumerate()
            .map(|(i, name)| Command::new(*name, "", "test", i).unwrap())
            .collect::<Vec<_>>();
        CommandTable::try_from(commands).unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut t = table(&["help"]);
        let err = t.push(Command::new("help", "", "again", 9).unwrap()).unwrap_err();
        assert_eq!(err, TableError::DuplicateName("help".to_string()));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            Command::new("", "", "", ()),
            Err(TableError::InvalidName(_))
        ));
        assert!(matches!(
            Command::new("two words", "", "", ()),
            Err(TableError::InvalidName(_))
        ));
    }

    #[test]
    fn test_bad_signature_rejected() {
        assert!(matches!(
            Command::new("cmd", "sq", "", ()),
            Err(TableError::Signature(_))
        ));
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let t = table(&["help", "when"]);
        assert_eq!(t.find_exact("when").map(|c| *c.handler()), Some(1));
        assert!(t.find_exact("When").is_none());
        assert!(t.find_exact("whe").is_none());
    }

    #[test]
    fn test_prefix_first_inserted_wins() {
        let t = table(&["addu", "addv"]);
        assert_eq!(t.find_prefix("add").map(Command::name), Some("addu"));
        assert_eq!(t.find_prefix("addv").map(Command::name), Some("addv"));
        assert!(t.find_prefix("addw").is_none());
        assert!(t.find_prefix("adduu").is_none());
        assert!(t.find_prefix("").is_none());
    }

    #[test]
    fn test_help_line_format() {
        let cmd = Command::new("sdir", "s", "Switch to a different directory.", ()).unwrap();
        assert_eq!(
            cmd.help_line(),
            "sdir       - [s    ]: Switch to a different directory.\r\n"
        );
    }
}
