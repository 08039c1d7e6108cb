mod asset_keys;
mod atomic_io;
mod images;
mod tmx;

pub use asset_keys::{validate_asset_key, AssetKeyError};
pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use images::{import_folder, is_png, ImageCache, ImageError, Surface};
pub use tmx::{
    MapError, MapLayer, MapObject, ObjectLayer, Properties, SourceLocation, TileLayer, TileMap,
};
