pub mod record;
pub mod shell;
