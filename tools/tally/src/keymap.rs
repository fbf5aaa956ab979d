use crate::types::EventKind;

/// What a single keystroke asks the session loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Record(EventKind),
    Undo,
    Summary,
    Help,
    Quit,
}

/// Maps a raw key to a command. Bindings are lowercase only; every
/// other key is ignored by the loop.
pub fn map_key(key: char) -> Option<InputCommand> {
    match key {
        'y' => Some(InputCommand::Record(EventKind::Yes)),
        'n' => Some(InputCommand::Record(EventKind::No)),
        'z' => Some(InputCommand::Undo),
        's' => Some(InputCommand::Summary),
        'h' => Some(InputCommand::Help),
        'q' => Some(InputCommand::Quit),
        _ => None,
    }
}
