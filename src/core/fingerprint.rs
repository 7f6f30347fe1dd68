use crate::error::{PollError, Result};
use image::{DynamicImage, ImageFormat};
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};
use std::fmt;
use std::fs;
use std::path::Path;

/// Hash side length; 8x8 gives a 64-bit average hash.
const HASH_SIDE: u32 = 8;

/// Perceptual fingerprint of a logo's visual content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(ImageHash);

impl Fingerprint {
    /// Rebuild a fingerprint from raw hash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        ImageHash::from_bytes(bytes).ok().map(Fingerprint)
    }

    /// Hamming distance in bits.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        self.0.dist(&other.0)
    }

    pub fn to_base64(&self) -> String {
        self.0.to_base64()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

pub fn is_vector(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

/// Computes mean-hash fingerprints. Vector sources are rasterized to a
/// square canvas first so an SVG and a PNG of the same artwork compare equal.
pub struct Fingerprinter {
    hasher: Hasher,
    canvas_size: u32,
}

impl Fingerprinter {
    pub fn new(canvas_size: u32) -> Self {
        Self {
            hasher: HasherConfig::new()
                .hash_alg(HashAlg::Mean)
                .hash_size(HASH_SIDE, HASH_SIDE)
                .to_hasher(),
            canvas_size,
        }
    }

    pub fn fingerprint_path(&self, path: &Path) -> Result<Fingerprint> {
        let data = fs::read(path)?;
        self.fingerprint_bytes(&data, is_vector(path))
    }

    pub fn fingerprint_bytes(&self, data: &[u8], vector: bool) -> Result<Fingerprint> {
        let img = if vector {
            rasterize_svg(data, self.canvas_size)?
        } else {
            image::load_from_memory(data)?
        };
        Ok(self.fingerprint_image(&img))
    }

    pub fn fingerprint_image(&self, img: &DynamicImage) -> Fingerprint {
        Fingerprint(self.hasher.hash_image(img))
    }
}

/// Render an SVG document onto a `size` x `size` canvas, stretching it to fill.
pub fn rasterize_svg(data: &[u8], size: u32) -> Result<DynamicImage> {
    let tree = Tree::from_data(data, &Options::default())
        .map_err(|e| PollError::Svg(e.to_string()))?;
    let mut pixmap = Pixmap::new(size, size)
        .ok_or_else(|| PollError::Svg(format!("invalid canvas size {}", size)))?;

    let svg_size = tree.size();
    let transform = Transform::from_scale(
        size as f32 / svg_size.width(),
        size as f32 / svg_size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let png = pixmap
        .encode_png()
        .map_err(|e| PollError::Svg(e.to_string()))?;
    Ok(image::load_from_memory_with_format(&png, ImageFormat::Png)?)
}
