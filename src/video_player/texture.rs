// SPDX-License-Identifier: MPL-2.0
//! Frame presentation sink.
//!
//! [`FrameSink`] owns at most one backend texture and uploads each decoded
//! frame into it. The texture is created lazily on the first upload and is
//! only recreated when the frame geometry changes; uploading any number of
//! same-sized frames reuses one allocation.

use crate::error::{Error, Result, VideoError};
use serde::{Deserialize, Serialize};

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFilter {
    /// Nearest-neighbour sampling (sharp pixels).
    Nearest,
    /// Bilinear sampling.
    #[default]
    Linear,
}

/// GPU (or CPU) texture API the sink drives.
///
/// Pixel data is always packed RGB24 with `width * 3` bytes per row.
pub trait TextureBackend {
    type Texture;

    /// Allocates a texture of the given size.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot allocate the resource.
    fn create(&mut self, width: u32, height: u32) -> Result<Self::Texture>;

    /// Replaces the texture contents.
    ///
    /// # Errors
    ///
    /// Fails if the upload is rejected by the backend.
    fn upload(
        &mut self,
        texture: &mut Self::Texture,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()>;

    fn set_filter(&mut self, texture: &mut Self::Texture, min: TextureFilter, mag: TextureFilter);

    fn dispose(&mut self, texture: Self::Texture);
}

/// Uploads frames into a lazily (re)allocated texture.
pub struct FrameSink<B: TextureBackend> {
    backend: B,
    texture: Option<B::Texture>,
    geometry: Option<(u32, u32)>,
    has_frame: bool,
    min_filter: TextureFilter,
    mag_filter: TextureFilter,
    allocations: u64,
}

impl<B: TextureBackend> FrameSink<B> {
    pub fn new(backend: B, min_filter: TextureFilter, mag_filter: TextureFilter) -> Self {
        Self {
            backend,
            texture: None,
            geometry: None,
            has_frame: false,
            min_filter,
            mag_filter,
            allocations: 0,
        }
    }

    /// Uploads one packed RGB24 frame of `width × height` pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels` is shorter than one frame or the backend
    /// fails to allocate or upload.
    pub fn upload(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<()> {
        let needed = width as usize * height as usize * 3;
        if pixels.len() < needed {
            return Err(Error::Video(VideoError::Other(format!(
                "frame buffer holds {} bytes, {width}x{height} needs {needed}",
                pixels.len()
            ))));
        }

        if self.geometry != Some((width, height)) || self.texture.is_none() {
            self.release();
            let mut texture = self.backend.create(width, height)?;
            self.backend
                .set_filter(&mut texture, self.min_filter, self.mag_filter);
            self.texture = Some(texture);
            self.geometry = Some((width, height));
            self.allocations += 1;
            log::debug!("allocated {width}x{height} presentation texture");
        }

        if let Some(texture) = self.texture.as_mut() {
            self.backend.upload(texture, &pixels[..needed], width, height)?;
            self.has_frame = true;
        }
        Ok(())
    }

    /// The texture holding the last uploaded frame, if any.
    #[must_use]
    pub fn current_texture(&self) -> Option<&B::Texture> {
        if self.has_frame {
            self.texture.as_ref()
        } else {
            None
        }
    }

    /// Changes the sampling filter, applying it to the live texture.
    pub fn set_filter(&mut self, min: TextureFilter, mag: TextureFilter) {
        if (min, mag) == (self.min_filter, self.mag_filter) {
            return;
        }
        self.min_filter = min;
        self.mag_filter = mag;
        if let Some(texture) = self.texture.as_mut() {
            self.backend.set_filter(texture, min, mag);
        }
    }

    #[must_use]
    pub fn filters(&self) -> (TextureFilter, TextureFilter) {
        (self.min_filter, self.mag_filter)
    }

    /// Disposes the texture. The next upload allocates a new one.
    pub fn release(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.backend.dispose(texture);
        }
        self.geometry = None;
        self.has_frame = false;
    }

    /// Number of textures allocated over the sink's lifetime.
    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    #[must_use]
    pub fn geometry(&self) -> Option<(u32, u32)> {
        self.geometry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: TextureBackend> Drop for FrameSink<B> {
    fn drop(&mut self) {
        self.release();
    }
}

// ==========================================================================
// CPU backend
// ==========================================================================

/// Texture kept in main memory.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    /// Uploads into this texture so far.
    pub uploads: u64,
}

/// [`TextureBackend`] that keeps frames in memory, for headless playback
/// and tests.
#[derive(Debug, Default)]
pub struct CpuTextureBackend {
    created: u64,
    disposed: u64,
}

impl CpuTextureBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn created(&self) -> u64 {
        self.created
    }

    #[must_use]
    pub fn disposed(&self) -> u64 {
        self.disposed
    }
}

impl TextureBackend for CpuTextureBackend {
    type Texture = CpuTexture;

    fn create(&mut self, width: u32, height: u32) -> Result<CpuTexture> {
        self.created += 1;
        Ok(CpuTexture {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
            min_filter: TextureFilter::default(),
            mag_filter: TextureFilter::default(),
            uploads: 0,
        })
    }

    fn upload(
        &mut self,
        texture: &mut CpuTexture,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()> {
        if (width, height) != (texture.width, texture.height) {
            return Err(Error::Video(VideoError::Other(format!(
                "upload of {width}x{height} into {}x{} texture",
                texture.width, texture.height
            ))));
        }
        texture.pixels.clear();
        texture.pixels.extend_from_slice(pixels);
        texture.uploads += 1;
        Ok(())
    }

    fn set_filter(&mut self, texture: &mut CpuTexture, min: TextureFilter, mag: TextureFilter) {
        texture.min_filter = min;
        texture.mag_filter = mag;
    }

    fn dispose(&mut self, _texture: CpuTexture) {
        self.disposed += 1;
    }
}
