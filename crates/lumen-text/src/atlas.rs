//! Fixed-size RGBA data images that glyph data is packed into.
//!
//! Each kind of glyph data has its own [`ImageInfos`] pool. Space is handed
//! out append-only; when the newest image cannot hold a request a fresh one
//! is added. Pixels are addressed linearly, row by row.

use lumen_render::{ImageData, Renderer, TextureId, TextureOptions};

use crate::error::{Result, TextError};

/// Side of every stroke image.
pub const STROKE_IMAGE_SIZE: u32 = 64;
/// Side of every row/column cell image.
pub const CELL_IMAGE_SIZE: u32 = 64;
/// Side of every row/column dimension image.
pub const GRID_IMAGE_SIZE: u32 = 64;

/// Largest integer a two-channel 7-bit pair can hold.
pub const MAX_PACKED_INDEX: usize = 0x3FFF;

/// Splits `value` into the high and low 7-bit halves the shader reassembles.
pub fn pack_index(value: usize) -> Result<[u8; 2]> {
    if value > MAX_PACKED_INDEX {
        return Err(TextError::TooComplex {
            requested: value,
            available: MAX_PACKED_INDEX,
        });
    }
    Ok([(value >> 7) as u8, (value & 0x7F) as u8])
}

/// Maps `0..=1` onto a byte.
pub fn unit_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// One image of a pool and the texture it is mirrored to.
#[derive(Debug)]
pub struct AtlasImage {
    data: ImageData,
    used: usize,
    texture: Option<TextureId>,
    dirty: bool,
}

impl AtlasImage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            data: ImageData::new(width, height),
            used: 0,
            texture: None,
            dirty: true,
        }
    }

    pub fn data(&self) -> &ImageData {
        &self.data
    }

    /// Pixels handed out so far.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Creates or refreshes the texture mirroring this image.
    fn sync(&mut self, renderer: &mut Renderer) -> Result<TextureId> {
        match self.texture {
            Some(id) if !self.dirty => Ok(id),
            Some(id) => {
                renderer.update_texture(id, Box::new(self.data.clone()))?;
                self.dirty = false;
                Ok(id)
            }
            None => {
                let id = renderer.create_texture(Box::new(self.data.clone()), TextureOptions::data());
                self.texture = Some(id);
                self.dirty = false;
                Ok(id)
            }
        }
    }
}

/// A reserved run of pixels in one pool image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasSlot {
    /// Image within the pool.
    pub image: usize,
    /// First reserved pixel.
    pub offset: usize,
}

/// Writes pixels into a reserved slot, one after another.
pub struct SlotWriter<'a> {
    image: &'a mut AtlasImage,
    next: usize,
    end: usize,
}

impl SlotWriter<'_> {
    pub fn push(&mut self, rgba: [u8; 4]) {
        if self.next >= self.end {
            tracing::error!("atlas slot overrun at pixel {}", self.next);
            return;
        }
        self.image.data.set_pixel(self.next, rgba);
        self.next += 1;
    }

    /// Index of the pixel the next `push` writes.
    pub fn position(&self) -> usize {
        self.next
    }
}

/// A growable pool of fixed-size data images.
#[derive(Debug)]
pub struct ImageInfos {
    width: u32,
    height: u32,
    images: Vec<AtlasImage>,
}

impl ImageInfos {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            images: Vec::new(),
        }
    }

    pub fn size(&self) -> [i32; 2] {
        [self.width as i32, self.height as i32]
    }

    /// Pixels one image holds.
    pub fn capacity(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn images(&self) -> &[AtlasImage] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Option<&AtlasImage> {
        self.images.get(index)
    }

    /// Reserves `space` consecutive pixels in the newest image, adding an
    /// image when it is full. Older images are never filled again. Fails when
    /// a single image could never hold `space`.
    pub fn find_image(&mut self, space: usize) -> Result<AtlasSlot> {
        let capacity = self.capacity();
        if space > capacity {
            tracing::error!(
                "glyph needs {} atlas pixels but an image holds {}",
                space,
                capacity
            );
            return Err(TextError::TooComplex {
                requested: space,
                available: capacity,
            });
        }
        let index = match self.images.last() {
            Some(last) if last.used + space <= capacity => self.images.len() - 1,
            _ => {
                tracing::debug!(
                    "adding {}x{} atlas image #{}",
                    self.width,
                    self.height,
                    self.images.len()
                );
                self.images.push(AtlasImage::new(self.width, self.height));
                self.images.len() - 1
            }
        };
        let image = &mut self.images[index];
        let offset = image.used;
        image.used += space;
        image.dirty = true;
        Ok(AtlasSlot {
            image: index,
            offset,
        })
    }

    /// A writer over `len` pixels starting at `slot`.
    pub fn writer(&mut self, slot: AtlasSlot, len: usize) -> Option<SlotWriter<'_>> {
        let image = self.images.get_mut(slot.image)?;
        Some(SlotWriter {
            image,
            next: slot.offset,
            end: slot.offset + len,
        })
    }

    /// Texture for image `index`, uploaded if it changed since the last call.
    pub fn texture(&mut self, renderer: &mut Renderer, index: usize) -> Result<Option<TextureId>> {
        match self.images.get_mut(index) {
            Some(image) => image.sync(renderer).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_index_splits_seven_bit_halves() {
        assert_eq!(pack_index(0).unwrap(), [0, 0]);
        assert_eq!(pack_index(130).unwrap(), [1, 2]);
        assert_eq!(pack_index(MAX_PACKED_INDEX).unwrap(), [127, 127]);
        assert!(matches!(
            pack_index(MAX_PACKED_INDEX + 1),
            Err(TextError::TooComplex { .. })
        ));
    }

    #[test]
    fn test_unit_byte_clamps() {
        assert_eq!(unit_byte(0.0), 0);
        assert_eq!(unit_byte(1.0), 255);
        assert_eq!(unit_byte(0.5), 128);
        assert_eq!(unit_byte(-1.0), 0);
        assert_eq!(unit_byte(2.0), 255);
    }

    #[test]
    fn test_find_image_appends_then_grows() {
        let mut pool = ImageInfos::new(4, 4);
        let a = pool.find_image(10).unwrap();
        let b = pool.find_image(6).unwrap();
        let c = pool.find_image(3).unwrap();

        assert_eq!(a, AtlasSlot { image: 0, offset: 0 });
        assert_eq!(b, AtlasSlot { image: 0, offset: 10 });
        assert_eq!(c, AtlasSlot { image: 1, offset: 0 });
        assert_eq!(pool.images().len(), 2);
        assert_eq!(pool.images()[0].used(), 16);
    }

    #[test]
    fn test_find_image_never_backfills_older_images() {
        let mut pool = ImageInfos::new(4, 4);
        pool.find_image(10).unwrap();
        // does not fit in image 0, opens image 1
        assert_eq!(pool.find_image(8).unwrap(), AtlasSlot { image: 1, offset: 0 });
        // would fit in image 0 but only the newest is used
        assert_eq!(pool.find_image(5).unwrap(), AtlasSlot { image: 1, offset: 8 });
        assert_eq!(pool.images()[0].used(), 10);
    }

    #[test]
    fn test_request_larger_than_an_image_is_too_complex() {
        let mut pool = ImageInfos::new(4, 4);
        let err = pool.find_image(17).unwrap_err();
        assert_eq!(
            err,
            TextError::TooComplex {
                requested: 17,
                available: 16
            }
        );
        assert_eq!(
            err.to_string(),
            "font is too complex to render in 3D: needs 17 slots but an atlas holds 16"
        );
        assert!(pool.images().is_empty());
    }

    #[test]
    fn test_writer_stays_inside_its_slot() {
        let mut pool = ImageInfos::new(4, 4);
        let slot = pool.find_image(2).unwrap();
        let mut writer = pool.writer(slot, 2).unwrap();
        writer.push([1, 2, 3, 4]);
        writer.push([5, 6, 7, 8]);
        writer.push([9, 9, 9, 9]);
        assert_eq!(writer.position(), 2);

        let data = pool.images()[0].data();
        assert_eq!(data.pixel(0), Some([1, 2, 3, 4]));
        assert_eq!(data.pixel(1), Some([5, 6, 7, 8]));
        assert_eq!(data.pixel(2), Some([0, 0, 0, 0]));
    }
}
