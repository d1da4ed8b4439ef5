pub mod assets;

pub use assets::{move_file, relocate_asset, resolve_unique_path};
