//! GPU buffers for retained geometry.
//!
//! Geometry is uploaded once per cache key and reused by every later draw
//! with the same key. The cache is bounded; inserting past the capacity
//! evicts the oldest entry (insertion order, not recency) and deletes its
//! buffers first.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lumen_geometry::Primitive;
//! use lumen_render::GeometryCache;
//! use lumen_test_utils::MockGlContext;
//!
//! let gl = Arc::new(MockGlContext::new());
//! let mut cache = GeometryCache::new(gl.clone(), 16);
//!
//! let cube = Primitive::cube();
//! cache.get_or_create(&cube.key(), || cube.build()).unwrap();
//! let uploaded = gl.bytes_uploaded();
//!
//! // A hit uploads nothing.
//! cache.get_or_create(&cube.key(), || cube.build()).unwrap();
//! assert_eq!(gl.bytes_uploaded(), uploaded);
//! assert_eq!(cache.len(), 1);
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use lumen_core::profiling::profile_function;
use lumen_geometry::Geometry;
use lumen_test_utils::{BufferTarget, BufferUsage, GlBuffer, GlContext, IndexType};

use crate::error::{RenderError, Result};

/// Entries kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 1000;

/// One uploaded attribute or index array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    pub handle: GlBuffer,
    /// Geometry generation the contents were uploaded from.
    pub generation: u64,
    /// Element count: floats for attributes, indices for index buffers.
    pub len: usize,
}

/// The buffers of one cached geometry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CachedGeometry {
    pub positions: Option<GpuBuffer>,
    pub normals: Option<GpuBuffer>,
    pub uvs: Option<GpuBuffer>,
    pub colors: Option<GpuBuffer>,
    pub line_positions: Option<GpuBuffer>,
    pub line_directions: Option<GpuBuffer>,
    pub indices: Option<GpuBuffer>,
    pub index_type: Option<IndexType>,
    /// Number of fill vertices; drawn with `draw_arrays` when there is no
    /// index buffer.
    pub vertex_count: usize,
    pub line_vertex_count: usize,
    pub geometry_id: u64,
    pub generation: u64,
}

impl CachedGeometry {
    pub fn index_count(&self) -> usize {
        self.indices.map_or(0, |b| b.len)
    }

    pub fn has_fill(&self) -> bool {
        self.index_count() > 0 || self.vertex_count > 0
    }

    pub fn has_stroke(&self) -> bool {
        self.line_vertex_count > 0
    }

    fn buffers(&self) -> impl Iterator<Item = GpuBuffer> + '_ {
        [
            self.positions,
            self.normals,
            self.uvs,
            self.colors,
            self.line_positions,
            self.line_directions,
            self.indices,
        ]
        .into_iter()
        .flatten()
    }
}

/// Cache of uploaded geometry keyed by primitive or model key.
pub struct GeometryCache {
    gl: Arc<dyn GlContext>,
    capacity: usize,
    entries: IndexMap<String, CachedGeometry>,
}

impl GeometryCache {
    pub fn new(gl: Arc<dyn GlContext>, capacity: usize) -> Self {
        Self {
            gl,
            capacity: capacity.max(1),
            entries: IndexMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CachedGeometry> {
        self.entries.get(key)
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the entry for `key`, building and uploading the geometry from
    /// `factory` on a miss.
    pub fn get_or_create(
        &mut self,
        key: &str,
        factory: impl FnOnce() -> Geometry,
    ) -> Result<&CachedGeometry> {
        if let Some(index) = self.entries.get_index_of(key) {
            tracing::trace!("geometry cache hit: {}", key);
            return Ok(&self.entries[index]);
        }
        profile_function!();
        tracing::debug!("geometry cache miss: {}", key);
        let geometry = factory();
        let entry = self.upload(&geometry)?;
        Ok(self.insert(key, entry))
    }

    /// Returns the entry for `key` with its buffers matching `geometry`'s
    /// current generation. Arrays of an older generation are re-uploaded
    /// into their existing buffers.
    pub fn sync(&mut self, key: &str, geometry: &Geometry) -> Result<&CachedGeometry> {
        if let Some(index) = self.entries.get_index_of(key) {
            let gl = Arc::clone(&self.gl);
            let entry = &mut self.entries[index];
            if entry.generation != geometry.generation() {
                tracing::debug!(
                    "geometry {} changed (generation {} -> {})",
                    key,
                    entry.generation,
                    geometry.generation()
                );
                sync(gl.as_ref(), entry, geometry)?;
            }
            return Ok(&self.entries[index]);
        }
        let entry = self.upload(geometry)?;
        Ok(self.insert(key, entry))
    }

    /// Deletes the buffers cached under `key`.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.shift_remove(key) {
            Some(entry) => {
                self.delete(&entry);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for (_, entry) in std::mem::take(&mut self.entries) {
            self.delete(&entry);
        }
    }

    /// Uploads `geometry` into fresh buffers. On failure the buffers created
    /// so far are deleted.
    fn upload(&self, geometry: &Geometry) -> Result<CachedGeometry> {
        let mut entry = CachedGeometry::default();
        if let Err(err) = sync(self.gl.as_ref(), &mut entry, geometry) {
            tracing::warn!("geometry upload failed, releasing partial buffers: {}", err);
            self.delete(&entry);
            return Err(err);
        }
        Ok(entry)
    }

    fn insert(&mut self, key: &str, entry: CachedGeometry) -> &CachedGeometry {
        while self.entries.len() >= self.capacity {
            let Some((evicted, old)) = self.entries.shift_remove_index(0) else {
                break;
            };
            tracing::debug!("geometry cache full ({}), evicting {}", self.capacity, evicted);
            self.delete(&old);
        }
        let (index, _) = self.entries.insert_full(key.to_string(), entry);
        &self.entries[index]
    }

    fn delete(&self, entry: &CachedGeometry) {
        for buffer in entry.buffers() {
            self.gl.delete_buffer(buffer.handle);
        }
    }
}

impl Drop for GeometryCache {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Brings every buffer of `entry` up to `geometry`'s generation. Both buffer
/// targets are unbound afterwards, also when an upload fails.
fn sync(gl: &dyn GlContext, entry: &mut CachedGeometry, geometry: &Geometry) -> Result<()> {
    let result = upload_all(gl, entry, geometry);
    if result.is_err() {
        gl.bind_buffer(BufferTarget::Array, None);
        gl.bind_buffer(BufferTarget::ElementArray, None);
    }
    result
}

fn upload_all(gl: &dyn GlContext, entry: &mut CachedGeometry, geometry: &Geometry) -> Result<()> {
    let generation = geometry.generation();
    let target = BufferTarget::Array;

    upload_floats(gl, &mut entry.positions, geometry.vertex_data(), generation)?;
    upload_floats(gl, &mut entry.normals, geometry.normal_data(), generation)?;
    upload_floats(gl, &mut entry.uvs, geometry.uvs(), generation)?;
    upload_floats(gl, &mut entry.colors, geometry.vertex_colors(), generation)?;
    upload_floats(gl, &mut entry.line_positions, geometry.line_vertex_data(), generation)?;
    upload_floats(gl, &mut entry.line_directions, geometry.line_normal_data(), generation)?;
    gl.bind_buffer(target, None);

    let indices = geometry.index_data();
    if indices.is_empty() {
        if let Some(old) = entry.indices.take() {
            gl.delete_buffer(old.handle);
        }
        entry.index_type = None;
    } else {
        let index_type = if geometry.needs_u32_indices() {
            if !gl.supports_extension("OES_element_index_uint") {
                tracing::error!(
                    "geometry has {} vertices but 32-bit indices are not supported",
                    geometry.vertices().len()
                );
                return Err(RenderError::IndexOverflow {
                    vertices: geometry.vertices().len(),
                });
            }
            IndexType::U32
        } else {
            IndexType::U16
        };
        let handle = buffer_for(gl, &mut entry.indices)?;
        gl.bind_buffer(BufferTarget::ElementArray, Some(handle));
        match index_type {
            IndexType::U32 => gl.buffer_data(
                BufferTarget::ElementArray,
                bytemuck::cast_slice(indices),
                BufferUsage::StaticDraw,
            ),
            IndexType::U16 => {
                let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                gl.buffer_data(
                    BufferTarget::ElementArray,
                    bytemuck::cast_slice(&narrow),
                    BufferUsage::StaticDraw,
                );
            }
        }
        gl.bind_buffer(BufferTarget::ElementArray, None);
        entry.indices = Some(GpuBuffer {
            handle,
            generation,
            len: indices.len(),
        });
        entry.index_type = Some(index_type);
    }

    entry.vertex_count = geometry.vertices().len();
    entry.line_vertex_count = geometry.line_vertices().len();
    entry.geometry_id = geometry.id();
    entry.generation = generation;
    Ok(())
}

fn buffer_for(gl: &dyn GlContext, slot: &mut Option<GpuBuffer>) -> Result<GlBuffer> {
    Ok(match slot {
        Some(existing) => existing.handle,
        None => gl.create_buffer()?,
    })
}

/// Uploads `data` into `slot` unless it already holds this generation.
/// Empty arrays free the buffer.
fn upload_floats(
    gl: &dyn GlContext,
    slot: &mut Option<GpuBuffer>,
    data: &[f32],
    generation: u64,
) -> Result<()> {
    if data.is_empty() {
        if let Some(old) = slot.take() {
            gl.delete_buffer(old.handle);
        }
        return Ok(());
    }
    if slot.is_some_and(|b| b.generation == generation) {
        return Ok(());
    }
    let handle = buffer_for(gl, slot)?;
    gl.bind_buffer(BufferTarget::Array, Some(handle));
    gl.buffer_data(BufferTarget::Array, bytemuck::cast_slice(data), BufferUsage::StaticDraw);
    tracing::trace!("uploaded {} floats to buffer {:?}", data.len(), handle);
    *slot = Some(GpuBuffer {
        handle,
        generation,
        len: data.len(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use lumen_geometry::Primitive;
    use lumen_test_utils::{GlCall, MockGlContext};

    use super::*;

    fn cache(capacity: usize) -> (Arc<MockGlContext>, GeometryCache) {
        let mock = Arc::new(MockGlContext::new());
        let cache = GeometryCache::new(mock.clone(), capacity);
        (mock, cache)
    }

    #[test]
    fn test_hit_reuses_buffers() {
        let (mock, mut cache) = cache(DEFAULT_CAPACITY);
        let cube = Primitive::cube();
        let first = cache.get_or_create(&cube.key(), || cube.build()).unwrap().clone();
        let creates = mock.count_buffer_creates();
        let bytes = mock.bytes_uploaded();

        let mut built = false;
        let second = cache
            .get_or_create(&cube.key(), || {
                built = true;
                cube.build()
            })
            .unwrap()
            .clone();
        assert!(!built);
        assert_eq!(first, second);
        assert_eq!(mock.count_buffer_creates(), creates);
        assert_eq!(mock.bytes_uploaded(), bytes);
    }

    #[test]
    fn test_entry_counts() {
        let (_mock, mut cache) = cache(DEFAULT_CAPACITY);
        let plane = Primitive::plane();
        let geometry = plane.build();
        let entry = cache.get_or_create(&plane.key(), || plane.build()).unwrap();
        assert_eq!(entry.vertex_count, geometry.vertices().len());
        assert_eq!(entry.index_count(), geometry.faces().len() * 3);
        assert_eq!(entry.index_type, Some(IndexType::U16));
        assert_eq!(entry.line_vertex_count, geometry.line_vertices().len());
        assert!(entry.has_stroke());
    }

    #[test]
    fn test_unindexed_geometry_counts_vertices() {
        let (mock, mut cache) = cache(DEFAULT_CAPACITY);
        let entry = cache
            .get_or_create("points", || {
                let mut g = Geometry::new(1, 1);
                g.push_vertex(lumen_core::math::Vector3::ZERO, [0.0, 0.0]);
                g.push_vertex(lumen_core::math::Vector3::X, [1.0, 0.0]);
                g
            })
            .unwrap();
        assert_eq!(entry.index_count(), 0);
        assert_eq!(entry.vertex_count, 2);
        assert!(entry.has_fill());
        assert!(!mock.calls().iter().any(|c| matches!(
            c,
            GlCall::BufferData {
                target: BufferTarget::ElementArray,
                ..
            }
        )));
    }

    #[test]
    fn test_fifo_eviction_frees_buffers() {
        let (mock, mut cache) = cache(2);
        for key in ["a", "b", "c"] {
            cache.get_or_create(key, || Primitive::plane().build()).unwrap();
        }
        assert_eq!(cache.keys().collect::<Vec<_>>(), ["b", "c"]);
        let per_entry = mock.count_buffer_creates() / 3;
        assert_eq!(mock.count_buffer_deletes(), per_entry);

        // touching "b" does not protect it
        cache.get_or_create("b", || Primitive::plane().build()).unwrap();
        cache.get_or_create("d", || Primitive::plane().build()).unwrap();
        assert_eq!(cache.keys().collect::<Vec<_>>(), ["c", "d"]);
    }

    #[test]
    fn test_sync_reuploads_on_new_generation() {
        let (mock, mut cache) = cache(DEFAULT_CAPACITY);
        let mut geometry = Primitive::plane().build();
        cache.sync("model", &geometry).unwrap();
        let creates = mock.count_buffer_creates();
        let uploads = mock.count_buffer_uploads();

        cache.sync("model", &geometry).unwrap();
        assert_eq!(mock.count_buffer_uploads(), uploads);

        geometry.vertices_mut()[0].z = 1.0;
        let entry = cache.sync("model", &geometry).unwrap();
        assert_eq!(entry.generation, geometry.generation());
        assert!(mock.count_buffer_uploads() > uploads);
        assert_eq!(mock.count_buffer_creates(), creates);
    }

    #[test]
    fn test_failed_upload_releases_partial_buffers() {
        let (mock, mut cache) = cache(DEFAULT_CAPACITY);
        // positions succeed, normals fail
        mock.fail_buffer_creates_after(1);
        let result = cache.get_or_create("cube", || Primitive::cube().build());
        assert!(result.is_err());
        assert!(cache.is_empty());
        assert_eq!(mock.count_buffer_creates(), 1);
        assert_eq!(mock.live_buffers(), 0);
        assert_eq!(mock.bound_buffer(BufferTarget::Array), None);

        mock.fail_buffer_creates_after(3);
        assert!(cache.sync("model", &Primitive::plane().build()).is_err());
        assert_eq!(mock.live_buffers(), 0);
    }

    #[test]
    fn test_large_mesh_without_u32_indices_fails() {
        let mock = Arc::new(MockGlContext::without_extensions());
        let mut cache = GeometryCache::new(mock.clone(), DEFAULT_CAPACITY);
        let mut big = Geometry::new(1, 1);
        for i in 0..70_000 {
            big.push_vertex(lumen_core::math::Vector3::xy(i as f32, 0.0), [0.0, 0.0]);
        }
        big.faces_mut().push([0, 1, 69_999]);

        let err = cache.sync("big", &big).unwrap_err();
        assert_eq!(err, RenderError::IndexOverflow { vertices: 70_000 });
        assert!(err.to_string().contains("split the mesh"));
        assert_eq!(mock.live_buffers(), 0);
        assert!(mock.draw_calls().is_empty());
    }

    #[test]
    fn test_drop_deletes_everything() {
        let (mock, mut cache) = cache(DEFAULT_CAPACITY);
        cache.get_or_create("cube", || Primitive::cube().build()).unwrap();
        assert!(mock.live_buffers() > 0);
        drop(cache);
        assert_eq!(mock.live_buffers(), 0);
    }
}
