//! Texture sources and the renderer-owned texture registry.
//!
//! The renderer never inspects where pixels come from. A [`TextureSource`]
//! only reports its size, its RGBA8 pixels and whether those pixels changed
//! since the last upload; still images, offscreen canvases and video frames
//! all fit behind it. Upload is lazy: a texture reaches the GPU the first
//! time it is bound, and again whenever its source reports a modification.

use std::sync::Arc;

use lumen_test_utils::{GlContext, GlTexture, TextureFilter, TextureWrap};

use crate::error::{RenderError, Result};

/// Pixels the renderer can upload as a 2D texture.
pub trait TextureSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Tightly packed RGBA8 rows, top row first.
    fn pixels(&self) -> &[u8];
    /// Whether the pixels changed since [`TextureSource::mark_uploaded`].
    fn is_modified(&self) -> bool;
    fn mark_uploaded(&mut self);
}

/// An in-memory RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    modified: bool,
}

impl ImageData {
    /// A transparent black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            modified: true,
        }
    }

    /// Wraps existing pixels. Returns `None` when `pixels` is not exactly
    /// `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize * 4).then_some(Self {
            width,
            height,
            pixels,
            modified: true,
        })
    }

    /// Mutable pixels; marks the image modified.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.modified = true;
        &mut self.pixels
    }

    /// Writes one RGBA pixel by linear index. Out of range indices are
    /// ignored.
    pub fn set_pixel(&mut self, index: usize, rgba: [u8; 4]) {
        if let Some(px) = self.pixels.get_mut(index * 4..index * 4 + 4) {
            px.copy_from_slice(&rgba);
            self.modified = true;
        }
    }

    pub fn pixel(&self, index: usize) -> Option<[u8; 4]> {
        self.pixels
            .get(index * 4..index * 4 + 4)
            .and_then(|px| px.try_into().ok())
    }
}

impl TextureSource for ImageData {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn mark_uploaded(&mut self) {
        self.modified = false;
    }
}

/// Handle to a texture owned by one renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) usize);

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Sampling parameters applied at upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Linear,
            wrap: TextureWrap::ClampToEdge,
        }
    }
}

impl TextureOptions {
    /// Exact texel fetches, for data textures.
    pub fn data() -> Self {
        Self {
            filter: TextureFilter::Nearest,
            wrap: TextureWrap::ClampToEdge,
        }
    }
}

struct TextureEntry {
    source: Box<dyn TextureSource>,
    options: TextureOptions,
    handle: Option<GlTexture>,
}

/// Textures created through one renderer, indexed by [`TextureId`].
pub struct TextureRegistry {
    gl: Arc<dyn GlContext>,
    entries: Vec<Option<TextureEntry>>,
}

impl TextureRegistry {
    pub(crate) fn new(gl: Arc<dyn GlContext>) -> Self {
        Self {
            gl,
            entries: Vec::new(),
        }
    }

    pub fn create(&mut self, source: Box<dyn TextureSource>, options: TextureOptions) -> TextureId {
        let entry = TextureEntry {
            source,
            options,
            handle: None,
        };
        match self.entries.iter().position(Option::is_none) {
            Some(free) => {
                self.entries[free] = Some(entry);
                TextureId(free)
            }
            None => {
                self.entries.push(Some(entry));
                TextureId(self.entries.len() - 1)
            }
        }
    }

    pub fn contains(&self, id: TextureId) -> bool {
        matches!(self.entries.get(id.0), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self, id: TextureId) -> Option<&dyn TextureSource> {
        self.entries.get(id.0)?.as_ref().map(|e| e.source.as_ref())
    }

    /// Mutable access to a texture's pixels. Sources track their own
    /// modification, so edits are re-uploaded at the next bind.
    pub fn source_mut(&mut self, id: TextureId) -> Option<&mut (dyn TextureSource + 'static)> {
        self.entries.get_mut(id.0)?.as_mut().map(|e| e.source.as_mut())
    }

    /// Swaps in new pixels; uploaded at the next bind.
    pub fn replace(&mut self, id: TextureId, source: Box<dyn TextureSource>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(RenderError::UnknownTexture(id.0))?;
        entry.source = source;
        Ok(())
    }

    /// Frees the GL texture; the id may be reused.
    pub fn remove(&mut self, id: TextureId) {
        if let Some(entry) = self.entries.get_mut(id.0).and_then(Option::take)
            && let Some(handle) = entry.handle
        {
            self.gl.delete_texture(handle);
        }
    }

    /// Binds `id` to texture `unit`, creating and uploading it first if
    /// needed.
    pub fn bind(&mut self, id: TextureId, unit: u32) -> Result<()> {
        let gl = Arc::clone(&self.gl);
        let entry = self
            .entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(RenderError::UnknownTexture(id.0))?;

        gl.active_texture(unit);
        let (handle, fresh) = match entry.handle {
            Some(handle) => (handle, false),
            None => {
                let handle = gl.create_texture()?;
                entry.handle = Some(handle);
                (handle, true)
            }
        };
        gl.bind_texture_2d(Some(handle));

        if fresh || entry.source.is_modified() {
            let source = &mut entry.source;
            tracing::trace!(
                "uploading texture {} ({}x{})",
                id.0,
                source.width(),
                source.height()
            );
            gl.tex_image_2d_rgba(source.width(), source.height(), source.pixels());
            gl.tex_parameters(entry.options.filter, entry.options.wrap);
            source.mark_uploaded();
        }
        Ok(())
    }

    /// Clears texture `unit`.
    pub fn unbind(&self, unit: u32) {
        self.gl.active_texture(unit);
        self.gl.bind_texture_2d(None);
    }
}

impl Drop for TextureRegistry {
    fn drop(&mut self) {
        for handle in self.entries.iter().flatten().filter_map(|e| e.handle) {
            self.gl.delete_texture(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use lumen_test_utils::{GlCall, MockGlContext};

    use super::*;

    fn registry() -> (Arc<MockGlContext>, TextureRegistry) {
        let mock = Arc::new(MockGlContext::new());
        let registry = TextureRegistry::new(mock.clone());
        (mock, registry)
    }

    #[test]
    fn test_upload_is_lazy_and_once() {
        let (mock, mut registry) = registry();
        let id = registry.create(Box::new(ImageData::new(4, 2)), TextureOptions::default());
        assert_eq!(mock.count_texture_creates(), 0);

        registry.bind(id, 0).unwrap();
        registry.bind(id, 0).unwrap();
        assert_eq!(mock.count_texture_creates(), 1);
        assert_eq!(mock.count_texture_uploads(), 1);
        assert!(mock.calls().contains(&GlCall::TexImage2D {
            texture: mock.bound_texture(0),
            width: 4,
            height: 2,
            bytes: 32,
        }));
    }

    #[test]
    fn test_modified_source_reuploads() {
        let (mock, mut registry) = registry();
        let id = registry.create(Box::new(ImageData::new(1, 1)), TextureOptions::data());
        registry.bind(id, 1).unwrap();

        let source = registry.source_mut(id).unwrap();
        assert!(!source.is_modified());
        registry
            .replace(id, Box::new(ImageData::from_rgba(1, 1, vec![255; 4]).unwrap()))
            .unwrap();
        registry.bind(id, 1).unwrap();
        assert_eq!(mock.count_texture_uploads(), 2);
        assert_eq!(mock.count_texture_creates(), 1);
    }

    #[test]
    fn test_unknown_texture() {
        let (_mock, mut registry) = registry();
        let id = registry.create(Box::new(ImageData::new(1, 1)), TextureOptions::default());
        registry.remove(id);
        assert_eq!(registry.bind(id, 0), Err(RenderError::UnknownTexture(id.0)));
    }

    #[test]
    fn test_image_data_rejects_wrong_size() {
        assert!(ImageData::from_rgba(2, 2, vec![0; 15]).is_none());
        let mut image = ImageData::new(2, 1);
        image.mark_uploaded();
        image.set_pixel(1, [1, 2, 3, 4]);
        assert!(image.is_modified());
        assert_eq!(image.pixel(1), Some([1, 2, 3, 4]));
        image.set_pixel(9, [0; 4]);
        assert_eq!(image.pixel(9), None);
    }
}
