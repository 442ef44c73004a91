pub mod error;
pub mod pref_store;
pub mod profile;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use pref_store::{ChangeEvent, PreferenceStore};
pub use profile::{ProfileStore, default_base_dir};
pub use store::Store;
