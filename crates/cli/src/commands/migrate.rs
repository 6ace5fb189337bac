use crate::commands::{with_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    match with_database("migrate", |_, _| async { Ok::<_, Failure>(()) }) {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
