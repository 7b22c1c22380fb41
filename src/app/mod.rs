pub mod init;
pub mod state;

pub use init::spawn_initialization;
pub use state::AppState;
