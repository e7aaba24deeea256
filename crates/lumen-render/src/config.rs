//! Renderer configuration decided once at creation.

/// Flags the host passes when it requests the GL context, plus renderer-wide
/// options that cannot change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAttributes {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
    /// Light per fragment (phong) instead of per vertex (Gouraud).
    pub per_pixel_lighting: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            alpha: true,
            depth: true,
            stencil: true,
            antialias: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: true,
            per_pixel_lighting: true,
        }
    }
}

/// Descriptor for configuring renderer creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererDescriptor {
    /// Surface width in CSS pixels
    pub width: u32,
    /// Surface height in CSS pixels
    pub height: u32,
    /// Device pixels per CSS pixel
    pub pixel_density: f32,
    pub attributes: ContextAttributes,
    /// Maximum number of retained geometries kept on the GPU
    pub geometry_cache_capacity: usize,
}

impl Default for RendererDescriptor {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            pixel_density: 1.0,
            attributes: ContextAttributes::default(),
            geometry_cache_capacity: crate::geometry_cache::DEFAULT_CAPACITY,
        }
    }
}

impl RendererDescriptor {
    /// Create a new descriptor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the surface size in CSS pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_pixel_density(mut self, density: f32) -> Self {
        self.pixel_density = density;
        self
    }

    pub fn with_attributes(mut self, attributes: ContextAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Choose Gouraud (`false`) or phong (`true`) lighting.
    pub fn with_per_pixel_lighting(mut self, enabled: bool) -> Self {
        self.attributes.per_pixel_lighting = enabled;
        self
    }

    /// Bound the retained geometry cache. A capacity of zero is raised to one.
    pub fn with_geometry_cache_capacity(mut self, capacity: usize) -> Self {
        self.geometry_cache_capacity = capacity.max(1);
        self
    }
}
