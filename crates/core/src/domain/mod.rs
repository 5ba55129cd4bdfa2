pub mod intent;
pub mod stage;
