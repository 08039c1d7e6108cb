use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error(
        "region at ({x},{y}) sized {width}x{height} lies outside a {surface_width}x{surface_height} image"
    )]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        surface_width: u32,
        surface_height: u32,
    },
    #[error("cannot slice a {width}x{height} image into {columns}x{rows} cells")]
    InvalidGrid {
        width: u32,
        height: u32,
        columns: u32,
        rows: u32,
    },
    #[error("failed to read image folder {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("image folder {path} contains no png files")]
    EmptyFolder { path: PathBuf },
}

/// Immutable RGBA8 image. Clones share the pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    rgba: Arc<[u8]>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Surface {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ImageError::BufferSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba: rgba.into(),
        })
    }

    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect::<Vec<_>>();
        Self {
            width,
            height,
            rgba: rgba.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ImageError> {
        let reader = ImageReader::open(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = reader.decode().map_err(|source| ImageError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let image = decoded.to_rgba8();
        let (width, height) = image.dimensions();
        Self::from_rgba(width, height, image.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.rgba[offset..offset + 4]);
        Some(out)
    }

    pub fn sub_surface(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self, ImageError> {
        let fits = x.checked_add(width).is_some_and(|right| right <= self.width)
            && y.checked_add(height).is_some_and(|bottom| bottom <= self.height);
        if !fits {
            return Err(ImageError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                surface_width: self.width,
                surface_height: self.height,
            });
        }

        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        let row_bytes = width as usize * 4;
        for row in y..y + height {
            let start = (row as usize * self.width as usize + x as usize) * 4;
            rgba.extend_from_slice(&self.rgba[start..start + row_bytes]);
        }
        Self::from_rgba(width, height, rgba)
    }

    /// Cuts the image into a `columns` x `rows` grid, row-major. Remainder pixels are dropped.
    pub fn slice_grid(&self, columns: u32, rows: u32) -> Result<Vec<Self>, ImageError> {
        let invalid = ImageError::InvalidGrid {
            width: self.width,
            height: self.height,
            columns,
            rows,
        };
        if columns == 0 || rows == 0 {
            return Err(invalid);
        }
        let cell_width = self.width / columns;
        let cell_height = self.height / rows;
        if cell_width == 0 || cell_height == 0 {
            return Err(invalid);
        }

        let mut cells = Vec::with_capacity(columns as usize * rows as usize);
        for row in 0..rows {
            for column in 0..columns {
                cells.push(self.sub_surface(
                    column * cell_width,
                    row * cell_height,
                    cell_width,
                    cell_height,
                )?);
            }
        }
        Ok(cells)
    }
}

/// Path-keyed image store so tilesets referenced by several maps decode once.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<PathBuf, Surface>,
}

impl ImageCache {
    pub fn insert(&mut self, path: impl AsRef<Path>, surface: Surface) {
        self.images.insert(lexical_normalize(path.as_ref()), surface);
    }

    pub fn load(&mut self, path: &Path) -> Result<Surface, ImageError> {
        let key = lexical_normalize(path);
        if let Some(surface) = self.images.get(&key) {
            return Ok(surface.clone());
        }
        let surface = Surface::load(&key)?;
        debug!(
            path = %key.display(),
            width = surface.width(),
            height = surface.height(),
            "image_loaded"
        );
        self.images.insert(key, surface.clone());
        Ok(surface)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Loads every PNG in `dir`, ordered by numeric file stem (`0.png`, `1.png`, ..., `10.png`).
/// Stems that are not numbers sort after numeric ones, by name.
pub fn import_folder(dir: &Path) -> Result<Vec<Surface>, ImageError> {
    let entries = fs::read_dir(dir).map_err(|source| ImageError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ImageError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_png(&path) && path.is_file() {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(ImageError::EmptyFolder {
            path: dir.to_path_buf(),
        });
    }

    files.sort_by_cached_key(|path| {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        (stem.parse::<u64>().map_or(u64::MAX, |index| index), stem)
    });
    files.iter().map(|path| Surface::load(path)).collect()
}

pub fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Collapses `.` and `..` without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
        let image = RgbaImage::from_pixel(width, height, image::Rgba(color));
        image.save(path).expect("save png");
    }

    #[test]
    fn slice_grid_is_row_major() {
        let mut rgba = Vec::new();
        for y in 0..2u8 {
            for x in 0..4u8 {
                rgba.extend_from_slice(&[x, y, 0, 255]);
            }
        }
        let sheet = Surface::from_rgba(4, 2, rgba).expect("sheet");
        let cells = sheet.slice_grid(2, 2).expect("cells");

        assert_eq!(cells.len(), 4);
        assert_eq!(cells[1].pixel(0, 0), Some([2, 0, 0, 255]));
        assert_eq!(cells[2].pixel(1, 0), Some([1, 1, 0, 255]));
        assert_eq!(cells[3].width(), 2);
        assert_eq!(cells[3].height(), 1);
    }

    #[test]
    fn sub_surface_rejects_out_of_bounds_regions() {
        let sheet = Surface::solid(8, 8, [1, 2, 3, 255]);
        assert!(sheet.sub_surface(4, 4, 4, 4).is_ok());
        assert!(matches!(
            sheet.sub_surface(6, 0, 4, 4),
            Err(ImageError::RegionOutOfBounds { .. })
        ));
        assert!(matches!(
            sheet.slice_grid(0, 2),
            Err(ImageError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn buffer_size_is_validated() {
        assert!(matches!(
            Surface::from_rgba(2, 2, vec![0; 3]),
            Err(ImageError::BufferSize { expected: 16, .. })
        ));
    }

    #[test]
    fn import_folder_orders_numerically() {
        let temp = TempDir::new().expect("temp");
        write_png(&temp.path().join("10.png"), 1, 1, [10, 0, 0, 255]);
        write_png(&temp.path().join("2.png"), 1, 1, [2, 0, 0, 255]);
        write_png(&temp.path().join("0.png"), 1, 1, [0, 0, 0, 255]);
        fs::write(temp.path().join("notes.txt"), "ignored").expect("write");

        let frames = import_folder(temp.path()).expect("frames");
        let reds = frames
            .iter()
            .map(|frame| frame.pixel(0, 0).expect("pixel")[0])
            .collect::<Vec<_>>();
        assert_eq!(reds, vec![0, 2, 10]);
    }

    #[test]
    fn import_folder_without_pngs_fails() {
        let temp = TempDir::new().expect("temp");
        assert!(matches!(
            import_folder(temp.path()),
            Err(ImageError::EmptyFolder { .. })
        ));
    }

    #[test]
    fn cache_serves_preloaded_surfaces_under_normalized_keys() {
        let mut cache = ImageCache::default();
        cache.insert("maps/../graphics/tree.png", Surface::solid(2, 2, [0; 4]));

        let tree = cache
            .load(Path::new("maps/./../graphics/tree.png"))
            .expect("cached");
        assert_eq!(tree.width(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_loads_from_disk_once() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("a.png");
        write_png(&path, 3, 2, [9, 9, 9, 255]);

        let mut cache = ImageCache::default();
        let first = cache.load(&path).expect("load");
        fs::remove_file(&path).expect("remove");
        let second = cache.load(&path).expect("cached");

        assert_eq!(first, second);
        assert_eq!((second.width(), second.height()), (3, 2));
    }

    #[test]
    fn lexical_normalize_keeps_leading_parent_dirs() {
        assert_eq!(
            lexical_normalize(Path::new("../a/./b/../c.png")),
            PathBuf::from("../a/c.png")
        );
    }
}
