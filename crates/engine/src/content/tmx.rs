use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::debug;

use super::images::{lexical_normalize, ImageCache, ImageError, Surface};

const FLIP_FLAGS_MASK: u32 = 0xF000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed XML in {path} at {location}: {message}")]
    Xml {
        path: PathBuf,
        location: SourceLocation,
        message: String,
    },
    #[error("invalid map data in {path} at {location}: {message}")]
    Invalid {
        path: PathBuf,
        location: SourceLocation,
        message: String,
    },
    #[error("tile image for map {path} failed to load: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("map {path} references gid {gid}, which no tileset covers")]
    UnknownGid { path: PathBuf, gid: u32 },
    #[error("map {path} has no layer named '{layer}'")]
    MissingLayer { path: PathBuf, layer: String },
    #[error("layer '{layer}' in map {path} is a {actual} layer, expected a {expected} layer")]
    WrongLayerKind {
        path: PathBuf,
        layer: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Custom key/value properties attached to an object or layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    /// Top-left corner, also for tile objects.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub gid: Option<u32>,
    pub properties: Properties,
}

#[derive(Debug, Clone)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    gids: Vec<u32>,
}

impl TileLayer {
    pub fn gid_at(&self, column: u32, row: u32) -> Option<u32> {
        if column >= self.width || row >= self.height {
            return None;
        }
        let gid = self.gids[(row * self.width + column) as usize];
        (gid != 0).then_some(gid)
    }

    /// Non-empty cells as `(column, row, gid)`, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let width = self.width.max(1);
        self.gids
            .iter()
            .enumerate()
            .filter(|(_, gid)| **gid != 0)
            .map(move |(index, gid)| (index as u32 % width, index as u32 / width, *gid))
    }
}

#[derive(Debug, Clone)]
pub struct ObjectLayer {
    pub name: String,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone)]
pub enum MapLayer {
    Tiles(TileLayer),
    Objects(ObjectLayer),
}

impl MapLayer {
    pub fn name(&self) -> &str {
        match self {
            Self::Tiles(layer) => &layer.name,
            Self::Objects(layer) => &layer.name,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Tiles(_) => "tile",
            Self::Objects(_) => "object",
        }
    }
}

/// An orthogonal Tiled map with every referenced tile image already resolved.
#[derive(Debug)]
pub struct TileMap {
    path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    layers: Vec<MapLayer>,
    tiles: HashMap<u32, Surface>,
}

impl TileMap {
    pub fn load(path: &Path, cache: &mut ImageCache) -> Result<Self, MapError> {
        let raw = fs::read_to_string(path).map_err(|source| MapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&raw, path, cache)
    }

    /// Parses map XML as if it had been read from `source_path`; relative
    /// tileset and image references resolve against its parent directory.
    pub fn parse_str(
        raw: &str,
        source_path: &Path,
        cache: &mut ImageCache,
    ) -> Result<Self, MapError> {
        let doc = parse_document(raw, source_path)?;
        let root = doc.root_element();
        let ctx = ParseContext {
            path: source_path,
            doc: &doc,
        };
        if root.tag_name().name() != "map" {
            return Err(ctx.invalid(root, "root element must be <map>".to_string()));
        }
        if let Some(orientation) = root.attribute("orientation") {
            if orientation != "orthogonal" {
                return Err(ctx.invalid(
                    root,
                    format!("unsupported orientation '{orientation}'"),
                ));
            }
        }
        if root.attribute("infinite") == Some("1") {
            return Err(ctx.invalid(root, "infinite maps are not supported".to_string()));
        }

        let width = ctx.required_u32(root, "width")?;
        let height = ctx.required_u32(root, "height")?;
        let tile_width = ctx.required_u32(root, "tilewidth")?;
        let tile_height = ctx.required_u32(root, "tileheight")?;

        let base_dir = source_path.parent().unwrap_or_else(|| Path::new(""));
        let mut tilesets = Vec::new();
        for node in root.children().filter(|node| node.has_tag_name("tileset")) {
            tilesets.push(parse_tileset_ref(&ctx, node, base_dir)?);
        }
        tilesets.sort_by_key(|tileset| tileset.first_gid);

        let mut layers = Vec::new();
        collect_layers(&ctx, root, &mut layers)?;

        let mut resolver = TileResolver {
            map_path: source_path,
            tilesets: &tilesets,
            cache,
            tiles: HashMap::new(),
        };
        for layer in &mut layers {
            match layer {
                MapLayer::Tiles(tiles) => {
                    for gid in tiles.gids.iter().copied().filter(|gid| *gid != 0) {
                        resolver.resolve(gid)?;
                    }
                }
                MapLayer::Objects(objects) => {
                    for object in &mut objects.objects {
                        let Some(gid) = object.gid else {
                            continue;
                        };
                        let image = resolver.resolve(gid)?;
                        if object.width <= 0.0 || object.height <= 0.0 {
                            object.width = image.width() as f32;
                            object.height = image.height() as f32;
                        }
                        object.y -= object.height;
                    }
                }
            }
        }
        let tiles = resolver.tiles;

        debug!(
            path = %source_path.display(),
            width,
            height,
            layer_count = layers.len(),
            tile_image_count = tiles.len(),
            "tile_map_parsed"
        );

        Ok(Self {
            path: source_path.to_path_buf(),
            width,
            height,
            tile_width,
            tile_height,
            layers,
            tiles,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Result<&MapLayer, MapError> {
        self.layers
            .iter()
            .find(|layer| layer.name() == name)
            .ok_or_else(|| MapError::MissingLayer {
                path: self.path.clone(),
                layer: name.to_string(),
            })
    }

    pub fn tile_layer(&self, name: &str) -> Result<&TileLayer, MapError> {
        match self.layer(name)? {
            MapLayer::Tiles(layer) => Ok(layer),
            other => Err(self.wrong_kind(name, "tile", other)),
        }
    }

    pub fn object_layer(&self, name: &str) -> Result<&ObjectLayer, MapError> {
        match self.layer(name)? {
            MapLayer::Objects(layer) => Ok(layer),
            other => Err(self.wrong_kind(name, "object", other)),
        }
    }

    /// Like [`TileMap::object_layer`], but a missing layer is `Ok(None)`.
    pub fn find_object_layer(&self, name: &str) -> Result<Option<&ObjectLayer>, MapError> {
        match self.layers.iter().find(|layer| layer.name() == name) {
            None => Ok(None),
            Some(MapLayer::Objects(layer)) => Ok(Some(layer)),
            Some(other) => Err(self.wrong_kind(name, "object", other)),
        }
    }

    pub fn tile_image(&self, gid: u32) -> Option<&Surface> {
        self.tiles.get(&gid)
    }

    pub fn object_image(&self, object: &MapObject) -> Option<&Surface> {
        object.gid.and_then(|gid| self.tile_image(gid))
    }

    fn wrong_kind(&self, name: &str, expected: &'static str, actual: &MapLayer) -> MapError {
        MapError::WrongLayerKind {
            path: self.path.clone(),
            layer: name.to_string(),
            expected,
            actual: actual.kind_name(),
        }
    }
}

struct ParseContext<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn invalid(&self, node: Node<'_, '_>, message: String) -> MapError {
        MapError::Invalid {
            path: self.path.to_path_buf(),
            location: self.location(node),
            message,
        }
    }

    fn required_u32(&self, node: Node<'_, '_>, name: &str) -> Result<u32, MapError> {
        let raw = node.attribute(name).ok_or_else(|| {
            self.invalid(
                node,
                format!("<{}> is missing attribute '{name}'", node.tag_name().name()),
            )
        })?;
        self.parse_u32(node, name, raw)
    }

    fn optional_u32(&self, node: Node<'_, '_>, name: &str, default: u32) -> Result<u32, MapError> {
        match node.attribute(name) {
            Some(raw) => self.parse_u32(node, name, raw),
            None => Ok(default),
        }
    }

    fn parse_u32(&self, node: Node<'_, '_>, name: &str, raw: &str) -> Result<u32, MapError> {
        raw.trim()
            .parse::<u32>()
            .map_err(|_| self.invalid(node, format!("attribute '{name}' is not an integer: '{raw}'")))
    }

    fn optional_f32(&self, node: Node<'_, '_>, name: &str) -> Result<f32, MapError> {
        match node.attribute(name) {
            Some(raw) => raw.trim().parse::<f32>().map_err(|_| {
                self.invalid(node, format!("attribute '{name}' is not a number: '{raw}'"))
            }),
            None => Ok(0.0),
        }
    }
}

fn parse_document<'input>(raw: &'input str, path: &Path) -> Result<Document<'input>, MapError> {
    Document::parse(raw).map_err(|error| MapError::Xml {
        path: path.to_path_buf(),
        location: SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        },
        message: error.to_string(),
    })
}

fn collect_layers(
    ctx: &ParseContext<'_, '_>,
    parent: Node<'_, '_>,
    out: &mut Vec<MapLayer>,
) -> Result<(), MapError> {
    for node in parent.children().filter(|node| node.is_element()) {
        match node.tag_name().name() {
            "layer" => out.push(MapLayer::Tiles(parse_tile_layer(ctx, node)?)),
            "objectgroup" => out.push(MapLayer::Objects(parse_object_layer(ctx, node)?)),
            "group" => collect_layers(ctx, node, out)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_tile_layer(ctx: &ParseContext<'_, '_>, node: Node<'_, '_>) -> Result<TileLayer, MapError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let width = ctx.required_u32(node, "width")?;
    let height = ctx.required_u32(node, "height")?;
    let data = node
        .children()
        .find(|child| child.has_tag_name("data"))
        .ok_or_else(|| ctx.invalid(node, format!("tile layer '{name}' has no <data>")))?;

    if data.attribute("compression").is_some() {
        return Err(ctx.invalid(data, "compressed tile data is not supported".to_string()));
    }
    let gids = match data.attribute("encoding") {
        Some("csv") => parse_csv_gids(ctx, data)?,
        Some("base64") => parse_base64_gids(ctx, data)?,
        None => data
            .children()
            .filter(|child| child.has_tag_name("tile"))
            .map(|tile| ctx.optional_u32(tile, "gid", 0))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(ctx.invalid(data, format!("unsupported tile encoding '{other}'")));
        }
    };
    let expected = width as usize * height as usize;
    if gids.len() != expected {
        return Err(ctx.invalid(
            data,
            format!(
                "tile layer '{name}' holds {} cells, expected {expected}",
                gids.len()
            ),
        ));
    }

    Ok(TileLayer {
        name,
        width,
        height,
        gids: gids.into_iter().map(|gid| gid & !FLIP_FLAGS_MASK).collect(),
    })
}

fn parse_csv_gids(ctx: &ParseContext<'_, '_>, data: Node<'_, '_>) -> Result<Vec<u32>, MapError> {
    data.text()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            cell.parse::<u32>()
                .map_err(|_| ctx.invalid(data, format!("csv cell '{cell}' is not a gid")))
        })
        .collect()
}

fn parse_base64_gids(
    ctx: &ParseContext<'_, '_>,
    data: Node<'_, '_>,
) -> Result<Vec<u32>, MapError> {
    let compact = data
        .text()
        .unwrap_or_default()
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|error| ctx.invalid(data, format!("invalid base64 tile data: {error}")))?;
    if bytes.len() % 4 != 0 {
        return Err(ctx.invalid(
            data,
            format!("base64 tile data length {} is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn parse_object_layer(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<ObjectLayer, MapError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let mut objects = Vec::new();
    for object in node.children().filter(|child| child.has_tag_name("object")) {
        let gid = match object.attribute("gid") {
            Some(raw) => Some(ctx.parse_u32(object, "gid", raw)? & !FLIP_FLAGS_MASK),
            None => None,
        };
        objects.push(MapObject {
            id: ctx.optional_u32(object, "id", 0)?,
            name: object.attribute("name").unwrap_or_default().to_string(),
            x: ctx.optional_f32(object, "x")?,
            y: ctx.optional_f32(object, "y")?,
            width: ctx.optional_f32(object, "width")?,
            height: ctx.optional_f32(object, "height")?,
            gid,
            properties: parse_properties(object),
        });
    }
    Ok(ObjectLayer { name, objects })
}

fn parse_properties(node: Node<'_, '_>) -> Properties {
    let mut properties = Properties::default();
    let entries = node
        .children()
        .filter(|child| child.has_tag_name("properties"))
        .flat_map(|block| block.children().filter(|child| child.has_tag_name("property")));
    for property in entries {
        let Some(name) = property.attribute("name") else {
            continue;
        };
        let value = property
            .attribute("value")
            .or_else(|| property.text())
            .unwrap_or_default();
        properties.insert(name, value);
    }
    properties
}

#[derive(Debug)]
enum TilesetImages {
    Grid {
        image: PathBuf,
        tile_width: u32,
        tile_height: u32,
        margin: u32,
        spacing: u32,
        columns: u32,
    },
    Collection(HashMap<u32, PathBuf>),
}

#[derive(Debug)]
struct Tileset {
    first_gid: u32,
    images: TilesetImages,
}

fn parse_tileset_ref(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    base_dir: &Path,
) -> Result<Tileset, MapError> {
    let first_gid = ctx.required_u32(node, "firstgid")?;
    let Some(source) = node.attribute("source") else {
        let images = parse_tileset_images(ctx, node, base_dir)?;
        return Ok(Tileset { first_gid, images });
    };

    let tsx_path = lexical_normalize(&base_dir.join(source));
    let raw = fs::read_to_string(&tsx_path).map_err(|source| MapError::Read {
        path: tsx_path.clone(),
        source,
    })?;
    let doc = parse_document(&raw, &tsx_path)?;
    let tsx_ctx = ParseContext {
        path: &tsx_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if !root.has_tag_name("tileset") {
        return Err(tsx_ctx.invalid(root, "root element must be <tileset>".to_string()));
    }
    let tsx_dir = tsx_path.parent().unwrap_or_else(|| Path::new(""));
    let images = parse_tileset_images(&tsx_ctx, root, tsx_dir)?;
    Ok(Tileset { first_gid, images })
}

fn parse_tileset_images(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    base_dir: &Path,
) -> Result<TilesetImages, MapError> {
    if let Some(image) = node.children().find(|child| child.has_tag_name("image")) {
        let source = image
            .attribute("source")
            .ok_or_else(|| ctx.invalid(image, "<image> is missing attribute 'source'".to_string()))?;
        let tile_width = ctx.required_u32(node, "tilewidth")?;
        let tile_height = ctx.required_u32(node, "tileheight")?;
        let margin = ctx.optional_u32(node, "margin", 0)?;
        let spacing = ctx.optional_u32(node, "spacing", 0)?;
        let derived_columns = match image.attribute("width") {
            Some(raw) => {
                let image_width = ctx.parse_u32(image, "width", raw)?;
                image_width.saturating_sub(2 * margin).saturating_add(spacing)
                    / tile_width.saturating_add(spacing).max(1)
            }
            None => 0,
        };
        let columns = ctx.optional_u32(node, "columns", derived_columns)?;
        if columns == 0 || tile_width == 0 || tile_height == 0 {
            return Err(ctx.invalid(node, "tileset grid has no usable columns".to_string()));
        }
        return Ok(TilesetImages::Grid {
            image: lexical_normalize(&base_dir.join(source)),
            tile_width,
            tile_height,
            margin,
            spacing,
            columns,
        });
    }

    let mut images = HashMap::new();
    for tile in node.children().filter(|child| child.has_tag_name("tile")) {
        let Some(image) = tile.children().find(|child| child.has_tag_name("image")) else {
            continue;
        };
        let id = ctx.required_u32(tile, "id")?;
        let source = image
            .attribute("source")
            .ok_or_else(|| ctx.invalid(image, "<image> is missing attribute 'source'".to_string()))?;
        images.insert(id, lexical_normalize(&base_dir.join(source)));
    }
    Ok(TilesetImages::Collection(images))
}

struct TileResolver<'a> {
    map_path: &'a Path,
    tilesets: &'a [Tileset],
    cache: &'a mut ImageCache,
    tiles: HashMap<u32, Surface>,
}

impl TileResolver<'_> {
    fn resolve(&mut self, gid: u32) -> Result<Surface, MapError> {
        if let Some(surface) = self.tiles.get(&gid) {
            return Ok(surface.clone());
        }
        let map_path = self.map_path;
        let tilesets = self.tilesets;
        let unknown = || MapError::UnknownGid {
            path: map_path.to_path_buf(),
            gid,
        };
        let tileset = tilesets
            .iter()
            .rev()
            .find(|tileset| tileset.first_gid <= gid)
            .ok_or_else(unknown)?;
        let local_id = gid - tileset.first_gid;

        let surface = match &tileset.images {
            TilesetImages::Grid {
                image,
                tile_width,
                tile_height,
                margin,
                spacing,
                columns,
            } => {
                let sheet = self.load_image(image)?;
                let x = margin + (local_id % columns) * (tile_width + spacing);
                let y = margin + (local_id / columns) * (tile_height + spacing);
                sheet
                    .sub_surface(x, y, *tile_width, *tile_height)
                    .map_err(|_| unknown())?
            }
            TilesetImages::Collection(images) => {
                let path = images.get(&local_id).ok_or_else(unknown)?;
                self.load_image(path)?
            }
        };
        self.tiles.insert(gid, surface.clone());
        Ok(surface)
    }

    fn load_image(&mut self, path: &Path) -> Result<Surface, MapError> {
        self.cache.load(path).map_err(|source| MapError::Image {
            path: self.map_path.to_path_buf(),
            source,
        })
    }
}
